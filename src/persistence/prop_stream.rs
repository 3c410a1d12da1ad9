/// Read cursor over a property blob. All multi-byte values are little-endian.
/// A failed read returns `None` and leaves the cursor where it was.
#[derive(Debug, Clone)]
pub struct PropStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PropStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        if self.remaining() < N {
            return None;
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[self.pos..self.pos + N]);
        self.pos += N;
        Some(out)
    }

    pub fn get_u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|b| b[0])
    }

    pub fn get_i8(&mut self) -> Option<i8> {
        self.take::<1>().map(i8::from_le_bytes)
    }

    pub fn get_u16(&mut self) -> Option<u16> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    pub fn get_i16(&mut self) -> Option<i16> {
        self.take::<2>().map(i16::from_le_bytes)
    }

    pub fn get_u32(&mut self) -> Option<u32> {
        self.take::<4>().map(u32::from_le_bytes)
    }

    pub fn get_i32(&mut self) -> Option<i32> {
        self.take::<4>().map(i32::from_le_bytes)
    }

    pub fn get_u64(&mut self) -> Option<u64> {
        self.take::<8>().map(u64::from_le_bytes)
    }

    pub fn get_f32(&mut self) -> Option<f32> {
        self.take::<4>().map(f32::from_le_bytes)
    }

    /// String with a u16 length prefix.
    pub fn get_string(&mut self) -> Option<String> {
        let start = self.pos;
        let len = self.get_u16()? as usize;
        self.finish_string(start, len)
    }

    /// String with a u32 length prefix.
    pub fn get_lstring(&mut self) -> Option<String> {
        let start = self.pos;
        let len = self.get_u32()? as usize;
        self.finish_string(start, len)
    }

    /// String of caller-supplied length.
    pub fn get_nstring(&mut self, len: usize) -> Option<String> {
        let bytes = self.get_raw(len)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn get_raw(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.remaining() < len {
            return None;
        }
        let start = self.pos;
        self.pos += len;
        Some(&self.data[start..start + len])
    }

    pub fn skip(&mut self, len: usize) -> Option<()> {
        if self.remaining() < len {
            return None;
        }
        self.pos += len;
        Some(())
    }

    fn finish_string(&mut self, prefix_start: usize, len: usize) -> Option<String> {
        match self.get_raw(len) {
            Some(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            None => {
                self.pos = prefix_start;
                None
            }
        }
    }
}

const INITIAL_CAPACITY: usize = 32;
const GROWTH_SLACK: usize = 0x1f;

/// Append-only writer for property blobs.
#[derive(Debug, Clone)]
pub struct PropWriteStream {
    data: Vec<u8>,
}

impl Default for PropWriteStream {
    fn default() -> Self {
        Self::new()
    }
}

impl PropWriteStream {
    pub fn new() -> Self {
        Self {
            data: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    fn reserve_for(&mut self, needed: usize) {
        let free = self.data.capacity() - self.data.len();
        if free < needed {
            self.data.reserve_exact(needed + GROWTH_SLACK);
        }
    }

    pub fn add_u8(&mut self, value: u8) {
        self.add_bytes(&[value]);
    }

    pub fn add_i8(&mut self, value: i8) {
        self.add_bytes(&value.to_le_bytes());
    }

    pub fn add_u16(&mut self, value: u16) {
        self.add_bytes(&value.to_le_bytes());
    }

    pub fn add_i16(&mut self, value: i16) {
        self.add_bytes(&value.to_le_bytes());
    }

    pub fn add_u32(&mut self, value: u32) {
        self.add_bytes(&value.to_le_bytes());
    }

    pub fn add_i32(&mut self, value: i32) {
        self.add_bytes(&value.to_le_bytes());
    }

    pub fn add_u64(&mut self, value: u64) {
        self.add_bytes(&value.to_le_bytes());
    }

    pub fn add_f32(&mut self, value: f32) {
        self.add_bytes(&value.to_le_bytes());
    }

    /// Writes a u16 length prefix; longer strings are truncated to 0xffff bytes.
    pub fn add_string(&mut self, value: &str) {
        let bytes = value.as_bytes();
        let len = bytes.len().min(usize::from(u16::MAX));
        self.add_u16(len as u16);
        self.add_bytes(&bytes[..len]);
    }

    pub fn add_lstring(&mut self, value: &str) {
        let bytes = value.as_bytes();
        self.add_u32(bytes.len() as u32);
        self.add_bytes(bytes);
    }

    pub fn add_bytes(&mut self, bytes: &[u8]) {
        self.reserve_for(bytes.len());
        self.data.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn lcg_next(state: &mut u64) -> u32 {
        *state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (*state >> 32) as u32
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Field {
        U8(u8),
        U16(u16),
        U32(u32),
        I32(i32),
        Str(String),
        LStr(String),
    }

    fn random_text(state: &mut u64) -> String {
        let len = (lcg_next(state) % 40) as usize;
        (0..len)
            .map(|_| char::from(b'a' + (lcg_next(state) % 26) as u8))
            .collect()
    }

    #[test]
    fn mixed_fields_roundtrip() {
        let mut state = 0x1234_5678_9abc_def0;
        for _ in 0..128 {
            let count = (lcg_next(&mut state) % 24) as usize;
            let mut fields = Vec::with_capacity(count);
            for _ in 0..count {
                let field = match lcg_next(&mut state) % 6 {
                    0 => Field::U8(lcg_next(&mut state) as u8),
                    1 => Field::U16(lcg_next(&mut state) as u16),
                    2 => Field::U32(lcg_next(&mut state)),
                    3 => Field::I32(lcg_next(&mut state) as i32),
                    4 => Field::Str(random_text(&mut state)),
                    _ => Field::LStr(random_text(&mut state)),
                };
                fields.push(field);
            }

            let mut writer = PropWriteStream::new();
            for field in &fields {
                match field {
                    Field::U8(v) => writer.add_u8(*v),
                    Field::U16(v) => writer.add_u16(*v),
                    Field::U32(v) => writer.add_u32(*v),
                    Field::I32(v) => writer.add_i32(*v),
                    Field::Str(v) => writer.add_string(v),
                    Field::LStr(v) => writer.add_lstring(v),
                }
            }

            let mut reader = PropStream::new(writer.as_slice());
            for field in &fields {
                let decoded = match field {
                    Field::U8(_) => Field::U8(reader.get_u8().expect("u8")),
                    Field::U16(_) => Field::U16(reader.get_u16().expect("u16")),
                    Field::U32(_) => Field::U32(reader.get_u32().expect("u32")),
                    Field::I32(_) => Field::I32(reader.get_i32().expect("i32")),
                    Field::Str(_) => Field::Str(reader.get_string().expect("string")),
                    Field::LStr(_) => Field::LStr(reader.get_lstring().expect("lstring")),
                };
                assert_eq!(&decoded, field);
            }
            assert_eq!(reader.remaining(), 0);
        }
    }

    #[test]
    fn short_read_leaves_cursor_unmoved() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = PropStream::new(&data);
        assert_eq!(reader.get_u32(), None);
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.get_u16(), Some(0x0201));
        assert_eq!(reader.skip(2), None);
        assert_eq!(reader.position(), 2);
        assert_eq!(reader.get_u8(), Some(0x03));
        assert_eq!(reader.get_u8(), None);
    }

    #[test]
    fn truncated_string_does_not_consume_prefix() {
        let mut writer = PropWriteStream::new();
        writer.add_u16(10);
        writer.add_bytes(b"abc");
        let mut reader = PropStream::new(writer.as_slice());
        assert_eq!(reader.get_string(), None);
        assert_eq!(reader.position(), 0);
        assert_eq!(reader.get_u16(), Some(10));
    }

    #[test]
    fn values_are_little_endian() {
        let mut writer = PropWriteStream::new();
        writer.add_u32(0x0403_0201);
        writer.add_f32(1.5);
        assert_eq!(&writer.as_slice()[..4], &[1, 2, 3, 4]);
        let mut reader = PropStream::new(writer.as_slice());
        reader.skip(4).expect("skip");
        assert_eq!(reader.get_f32(), Some(1.5));
    }

    #[test]
    fn writer_grows_past_initial_buffer() {
        let mut writer = PropWriteStream::new();
        let text = "x".repeat(500);
        writer.add_string(&text);
        writer.add_u8(7);
        assert_eq!(writer.len(), 2 + 500 + 1);
        let mut reader = PropStream::new(writer.as_slice());
        assert_eq!(reader.get_string().as_deref(), Some(text.as_str()));
        assert_eq!(reader.get_nstring(0).as_deref(), Some(""));
        assert_eq!(reader.get_u8(), Some(7));
    }

    proptest! {
        #[test]
        fn raw_bytes_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let mut writer = PropWriteStream::new();
            writer.add_u32(bytes.len() as u32);
            writer.add_bytes(&bytes);
            let mut reader = PropStream::new(writer.as_slice());
            let len = reader.get_u32().expect("len") as usize;
            prop_assert_eq!(reader.get_raw(len).expect("raw"), bytes.as_slice());
            prop_assert_eq!(reader.remaining(), 0);
        }
    }
}
