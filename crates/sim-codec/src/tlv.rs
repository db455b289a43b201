//! Simple-TLV iteration.
//!
//! Tags are one byte. Lengths are one byte, or `0x81` followed by one length
//! byte for values of 128 bytes and more. A `0xFF` tag or a length running past
//! the end of the buffer ends the sequence; whatever follows is padding.

/// One tag-length-value object borrowed from the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvObject<'a> {
    pub tag: u8,
    pub data: &'a [u8],
}

/// Lazy iterator over the TLV objects of a buffer.
///
/// Cloning the iterator restarts from the clone's position.
#[derive(Debug, Clone)]
pub struct TlvIter<'a> {
    buf: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> TlvIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            done: false,
        }
    }

    /// First object with `tag`, if any.
    pub fn find_tag(mut self, tag: u8) -> Option<TlvObject<'a>> {
        self.find(|obj| obj.tag == tag)
    }

    fn parse_next(&mut self) -> Option<TlvObject<'a>> {
        let rest = self.buf.get(self.pos..)?;
        let (&tag, rest) = rest.split_first()?;
        if tag == 0xFF {
            return None;
        }
        let (&first, rest) = rest.split_first()?;
        let (length, header) = match first {
            0x81 => (*rest.first()? as usize, 3),
            0x80 | 0x82..=0xFF => return None,
            short => (short as usize, 2),
        };
        let start = self.pos + header;
        let data = self.buf.get(start..start + length)?;
        self.pos = start + length;
        Some(TlvObject { tag, data })
    }
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = TlvObject<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let next = self.parse_next();
        if next.is_none() {
            self.done = true;
        }
        next
    }
}
