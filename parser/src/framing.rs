//! Section 0-5 framing: the outer bulletin envelope around the data
//! descriptor stream and its encoded subsets (§4.6).

use bufr_core::{Bulletin, Code, Edition, Identification};
use bufr_encoding::{read_uint_be, BitWriter};

use crate::error::{self, Result};

const MAGIC_START: &[u8] = b"BUFR";
const MAGIC_END: &[u8] = b"7777";

/// A cursor over the raw message bytes, tracking section number for
/// diagnostics.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    section: u8,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Cursor { data, pos: 0, section: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.data.len() {
            return Err(error::Error::Codec {
                source: bufr_encoding::Error::EndOfBuffer {
                    needed: n as u32,
                    available: (self.data.len() - self.pos) as u32,
                },
            });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from(b[0]) << 8 | u16::from(b[1]))
    }

    fn u24(&mut self) -> Result<u32> {
        Ok(read_uint_be(self.take(3)?, 0, 3)?)
    }
}

/// Read section 0, returning the declared total message length and edition.
fn read_section0(c: &mut Cursor<'_>) -> Result<(u32, Edition)> {
    c.section = 0;
    let magic = c.take(4)?;
    if magic != MAGIC_START {
        return Err(error::Error::UnexpectedMagic {
            expected: MAGIC_START,
            found: magic.to_vec(),
        });
    }
    let total_len = c.u24()?;
    let edition_byte = c.u8()?;
    let edition = Edition::from_byte(edition_byte).ok_or(error::Error::Core {
        source: bufr_core::Error::UnexpectedEdition { edition: edition_byte },
    })?;
    Ok((total_len, edition))
}

fn read_section1(c: &mut Cursor<'_>, edition: Edition) -> Result<(Identification, bool)> {
    c.section = 1;
    let start = c.pos;
    let len = c.u24()?;
    let master_table = c.u8()?;

    let mut ident = Identification {
        master_table,
        ..Identification::default()
    };
    let has_section2;

    match edition {
        Edition::Edition4 => {
            ident.centre = c.u16()?;
            ident.subcentre = c.u16()?;
            ident.update_sequence_number = c.u8()?;
            has_section2 = c.u8()? & 0x80 != 0;
            ident.data_type = c.u8()?;
            ident.subtype = c.u8()?;
            ident.local_subtype = c.u8()?;
            ident.master_table_version = c.u8()?;
            ident.local_table_version = c.u8()?;
            ident.year = c.u16()?;
            ident.month = c.u8()?;
            ident.day = c.u8()?;
            ident.hour = c.u8()?;
            ident.minute = c.u8()?;
            ident.second = c.u8()?;
        }
        Edition::Edition2 | Edition::Edition3 => {
            ident.subcentre = u16::from(c.u8()?);
            ident.centre = u16::from(c.u8()?);
            ident.update_sequence_number = c.u8()?;
            has_section2 = c.u8()? & 0x80 != 0;
            ident.data_type = c.u8()?;
            ident.local_subtype = c.u8()?;
            ident.master_table_version = c.u8()?;
            ident.local_table_version = c.u8()?;
            let year_of_century = c.u8()?;
            ident.month = c.u8()?;
            ident.day = c.u8()?;
            ident.hour = c.u8()?;
            ident.minute = c.u8()?;
            let century = c.u8()?;
            ident.year = u16::from(century) * 100 + u16::from(year_of_century % 100);
        }
    }

    let consumed = c.pos - start;
    if consumed > len as usize {
        return Err(error::Error::SectionLengthMismatch {
            section: 1,
            declared: len,
            actual: consumed as u32,
        });
    }
    c.pos = start + len as usize;
    Ok((ident, has_section2))
}

fn read_section2(c: &mut Cursor<'_>, has_section2: bool) -> Result<Option<Vec<u8>>> {
    if !has_section2 {
        return Ok(None);
    }
    c.section = 2;
    let start = c.pos;
    let len = c.u24()?;
    let _reserved = c.u8()?;
    let payload_len = (len as usize).saturating_sub(4);
    let payload = c.take(payload_len)?.to_vec();
    c.pos = start + len as usize;
    Ok(Some(payload))
}

fn read_section3(c: &mut Cursor<'_>) -> Result<(u16, bool, bool, Vec<Code>)> {
    c.section = 3;
    let start = c.pos;
    let len = c.u24()?;
    let _reserved = c.u8()?;
    let num_subsets = c.u16()?;
    let flags = c.u8()?;
    let observed = flags & 0x80 != 0;
    let compressed = flags & 0x40 != 0;
    let remaining = (len as usize).saturating_sub(7);
    let n_desc = remaining / 2;
    let mut datadesc = Vec::with_capacity(n_desc);
    for _ in 0..n_desc {
        datadesc.push(Code::from(c.u16()?));
    }
    c.pos = start + len as usize;
    Ok((num_subsets, observed, compressed, datadesc))
}

/// Parsed section headers needed to drive the rest of decoding.
pub struct BulletinFrame {
    /// Section 0's declared total message length.
    pub total_len: u32,
    /// The message edition.
    pub edition: Edition,
    /// Section 1 identification fields.
    pub ident: Identification,
    /// Section 2 payload, if the optional section is present.
    pub optional_section: Option<Vec<u8>>,
    /// Number of data subsets declared in section 3.
    pub num_subsets: u16,
    /// Whether the "observed data" flag is set.
    pub observed: bool,
    /// Whether section 4 uses compressed layout.
    pub compression: bool,
    /// The top-level descriptor list.
    pub datadesc: Vec<Code>,
    /// Byte offset where section 4's data begins (just past its length/
    /// reserved-byte header).
    pub section4_data_start: usize,
    /// Section 4's declared length (including its own 4 byte header).
    pub section4_len: u32,
}

/// Read section 0 through the section 4 header, leaving the caller to pull
/// the bit-packed data payload itself (its length is `section4_len - 4`).
pub fn read_frame(data: &[u8]) -> Result<BulletinFrame> {
    let mut c = Cursor::new(data);
    let (total_len, edition) = read_section0(&mut c)?;
    let (ident, has_section2) = read_section1(&mut c, edition)?;
    let optional_section = read_section2(&mut c, has_section2)?;

    c.section = 3;
    let (num_subsets, observed, compression, datadesc) = read_section3(&mut c)?;

    c.section = 4;
    let section4_len = c.u24()?;
    let _reserved = c.u8()?;
    let section4_data_start = c.pos;

    Ok(BulletinFrame {
        total_len,
        edition,
        ident,
        optional_section,
        num_subsets,
        observed,
        compression,
        datadesc,
        section4_data_start,
        section4_len,
    })
}

/// Verify the trailing section 5 magic.
pub fn check_section5(data: &[u8]) -> Result<()> {
    let tail = data.len().checked_sub(4).map(|i| &data[i..]);
    match tail {
        Some(magic) if magic == MAGIC_END => Ok(()),
        Some(magic) => Err(error::Error::UnexpectedMagic {
            expected: MAGIC_END,
            found: magic.to_vec(),
        }),
        None => Err(error::Error::UnexpectedMagic {
            expected: MAGIC_END,
            found: Vec::new(),
        }),
    }
}

/// Write the section 0-3 header ahead of the bit-packed data section.
#[allow(clippy::too_many_arguments)]
pub fn write_header(
    out: &mut Vec<u8>,
    edition: Edition,
    ident: &Identification,
    optional_section: Option<&[u8]>,
    num_subsets: u16,
    observed: bool,
    compression: bool,
    datadesc: &[Code],
) {
    out.extend_from_slice(MAGIC_START);
    out.extend_from_slice(&[0, 0, 0]); // total length, patched by caller
    out.push(edition.as_byte());

    let section1_start = out.len();
    out.extend_from_slice(&[0, 0, 0]); // section 1 length, patched below
    out.push(ident.master_table);
    match edition {
        Edition::Edition4 => {
            out.extend_from_slice(&ident.centre.to_be_bytes());
            out.extend_from_slice(&ident.subcentre.to_be_bytes());
            out.push(ident.update_sequence_number);
            out.push(if optional_section.is_some() { 0x80 } else { 0 });
            out.push(ident.data_type);
            out.push(ident.subtype);
            out.push(ident.local_subtype);
            out.push(ident.master_table_version);
            out.push(ident.local_table_version);
            out.extend_from_slice(&ident.year.to_be_bytes());
            out.push(ident.month);
            out.push(ident.day);
            out.push(ident.hour);
            out.push(ident.minute);
            out.push(ident.second);
        }
        Edition::Edition2 | Edition::Edition3 => {
            out.push(ident.subcentre as u8);
            out.push(ident.centre as u8);
            out.push(ident.update_sequence_number);
            out.push(if optional_section.is_some() { 0x80 } else { 0 });
            out.push(ident.data_type);
            out.push(ident.local_subtype);
            out.push(ident.master_table_version);
            out.push(ident.local_table_version);
            let year_of_century = if ident.year == 2000 {
                100
            } else {
                (ident.year % 100) as u8
            };
            out.push(year_of_century);
            out.push(ident.month);
            out.push(ident.day);
            out.push(ident.hour);
            out.push(ident.minute);
            out.push((ident.year / 100) as u8);
        }
    }
    patch_length(out, section1_start, out.len() - section1_start);

    if let Some(payload) = optional_section {
        let section2_start = out.len();
        out.extend_from_slice(&[0, 0, 0]);
        out.push(0);
        out.extend_from_slice(payload);
        if out.len() % 2 != 0 {
            out.push(0);
        }
        patch_length(out, section2_start, out.len() - section2_start);
    }

    let section3_start = out.len();
    out.extend_from_slice(&[0, 0, 0]);
    out.push(0);
    out.extend_from_slice(&num_subsets.to_be_bytes());
    let mut flags = 0u8;
    if observed {
        flags |= 0x80;
    }
    if compression {
        flags |= 0x40;
    }
    out.push(flags);
    for code in datadesc {
        out.extend_from_slice(&u16::from(*code).to_be_bytes());
    }
    if out.len() % 2 != 0 {
        out.push(0);
    }
    patch_length(out, section3_start, out.len() - section3_start);
}

/// Append the bit-packed section 4 payload (already built by the caller via
/// [`BitWriter`]) with its own length header, and finally section 5 and the
/// overall section 0 length.
pub fn write_trailer(out: &mut Vec<u8>, writer: BitWriter) {
    let section4_start = out.len();
    out.extend_from_slice(&[0, 0, 0]);
    out.push(0);
    let mut payload = writer.finish();
    if payload.len() % 2 != 0 {
        payload.push(0);
    }
    out.extend_from_slice(&payload);
    patch_length(out, section4_start, out.len() - section4_start);

    out.extend_from_slice(MAGIC_END);
    patch_length(out, 0, out.len());
}

fn patch_length(out: &mut [u8], start: usize, len: usize) {
    let len = len as u32;
    out[start] = ((len >> 16) & 0xff) as u8;
    out[start + 1] = ((len >> 8) & 0xff) as u8;
    out[start + 2] = (len & 0xff) as u8;
}

/// Validate section 0's declared total length against the actual message
/// size, once the whole message has been assembled.
pub fn check_total_length(data: &[u8]) -> Result<()> {
    let declared = read_uint_be(data, 4, 3)?;
    if declared as usize != data.len() {
        return Err(error::Error::SectionLengthMismatch {
            section: 0,
            declared,
            actual: data.len() as u32,
        });
    }
    Ok(())
}

/// Build the `Bulletin` shell (everything but the decoded subsets) from a
/// parsed frame, for callers that fill in `subsets` after running the DDS
/// interpreter over section 4.
pub fn frame_to_bulletin(frame: &BulletinFrame) -> Bulletin {
    Bulletin {
        edition: frame.edition,
        ident: frame.ident.clone(),
        optional_section: frame.optional_section.clone(),
        datadesc: frame.datadesc.clone(),
        compression: frame.compression,
        observed: frame.observed,
        subsets: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_ident() -> Identification {
        Identification {
            master_table: 0,
            centre: 98,
            subcentre: 0,
            update_sequence_number: 0,
            data_type: 1,
            subtype: 0,
            local_subtype: 0,
            master_table_version: 28,
            local_table_version: 0,
            year: 2024,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }

    #[test]
    fn header_round_trips_datadesc_and_subset_count() {
        let mut out = Vec::new();
        let datadesc = vec![Code::new(3, 1, 1), Code::new(0, 1, 1)];
        write_header(&mut out, Edition::Edition4, &sample_ident(), None, 2, true, false, &datadesc);
        write_trailer(&mut out, BitWriter::new());

        check_section5(&out).unwrap();
        check_total_length(&out).unwrap();

        let frame = read_frame(&out).unwrap();
        assert_eq!(frame.edition, Edition::Edition4);
        assert_eq!(frame.num_subsets, 2);
        assert!(frame.observed);
        assert!(!frame.compression);
        assert_eq!(frame.datadesc, datadesc);
        assert_eq!(frame.ident.centre, 98);
        assert_eq!(frame.ident.master_table_version, 28);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = read_frame(b"XXXX\x00\x00\x08\x04");
        assert!(err.is_err());
    }

    #[test]
    fn edition3_uses_year_of_century() {
        let mut out = Vec::new();
        let mut ident = sample_ident();
        ident.year = 24;
        write_header(&mut out, Edition::Edition3, &ident, None, 1, false, false, &[]);
        write_trailer(&mut out, BitWriter::new());
        let frame = read_frame(&out).unwrap();
        assert_eq!(frame.edition, Edition::Edition3);
        assert_eq!(frame.ident.year, 24);
    }

    #[test]
    fn edition3_round_trips_year_2024_and_update_sequence_number() {
        let mut out = Vec::new();
        let mut ident = sample_ident();
        ident.year = 2024;
        ident.update_sequence_number = 7;
        write_header(&mut out, Edition::Edition3, &ident, None, 1, false, false, &[]);
        write_trailer(&mut out, BitWriter::new());
        let frame = read_frame(&out).unwrap();
        assert_eq!(frame.ident.year, 2024);
        assert_eq!(frame.ident.update_sequence_number, 7);
    }

    #[test]
    fn edition3_year_2000_uses_the_century_sentinel() {
        let mut out = Vec::new();
        let mut ident = sample_ident();
        ident.year = 2000;
        write_header(&mut out, Edition::Edition3, &ident, None, 1, false, false, &[]);
        write_trailer(&mut out, BitWriter::new());
        let frame = read_frame(&out).unwrap();
        assert_eq!(frame.ident.year, 2000);
    }
}
