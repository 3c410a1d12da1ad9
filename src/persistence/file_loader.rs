use crate::persistence::prop_stream::PropStream;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const NODE_START: u8 = 0xfe;
pub const NODE_END: u8 = 0xff;
pub const ESCAPE_CHAR: u8 = 0xfd;

pub const CACHE_BLOCKS: usize = 3;
const MIN_CACHE_SIZE: u64 = 8192;
const MAX_CACHE_SIZE: u64 = 32768;
const CACHE_ALIGN_MASK: u64 = 0x1fff;
const INITIAL_SCRATCH: usize = 1024;
const FILE_VERSION: u32 = 0;
const HEADER_LEN: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FileLoaderError {
    #[error("file not open")]
    NotOpen,
    #[error("invalid node")]
    InvalidNode,
    #[error("can not create file")]
    CanNotCreate,
    #[error("can not open file")]
    CanNotOpen,
    #[error("invalid file version")]
    InvalidFileVersion,
    #[error("invalid file format")]
    InvalidFormat,
    #[error("unexpected end of file")]
    Eof,
    #[error("seek error")]
    SeekError,
    #[error("tell error")]
    TellError,
    #[error("could not write")]
    CouldNotWrite,
    #[error("cache error")]
    CacheError,
}

/// Index of a node in the loader's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Node {
    node_type: u8,
    /// Offset of the node's NODE_START byte; the type byte follows it.
    start: u64,
    /// First property byte, past the type byte and its escape if any.
    props_start: u64,
    /// Escaped length of the property run starting at `props_start`.
    props_size: u64,
    child: Option<NodeId>,
    next: Option<NodeId>,
}

impl Node {
    fn at(start: u64) -> Self {
        Self {
            node_type: 0,
            start,
            props_start: start + 2,
            props_size: 0,
            child: None,
            next: None,
        }
    }
}

#[derive(Debug, Default)]
struct CacheSlot {
    loaded: bool,
    base: u64,
    data: Vec<u8>,
}

#[derive(Debug)]
struct BlockCache {
    block_size: u64,
    slots: [CacheSlot; CACHE_BLOCKS],
    current: Option<usize>,
}

impl BlockCache {
    fn for_file_size(file_size: u64) -> Self {
        let block_size = (file_size / 20).clamp(MIN_CACHE_SIZE, MAX_CACHE_SIZE) & !CACHE_ALIGN_MASK;
        Self {
            block_size,
            slots: Default::default(),
            current: None,
        }
    }

    fn aligned_base(&self, pos: u64) -> u64 {
        pos - pos % self.block_size
    }

    fn slot_covering(&self, pos: u64) -> Option<usize> {
        let base = self.aligned_base(pos);
        self.slots
            .iter()
            .position(|slot| slot.loaded && slot.base == base)
    }

    fn victim_for(&self, base: u64) -> usize {
        if let Some(free) = self.slots.iter().position(|slot| !slot.loaded) {
            return free;
        }
        let far = 2 * self.block_size;
        self.slots
            .iter()
            .position(|slot| slot.base.abs_diff(base) > far)
            .unwrap_or(0)
    }
}

#[derive(Debug)]
struct ReadSource {
    file: BufReader<File>,
    len: u64,
    pos: u64,
    cache: Option<BlockCache>,
}

impl ReadSource {
    fn seek(&mut self, pos: u64) -> Result<(), FileLoaderError> {
        if self.cache.is_some() {
            self.block_for(pos)?;
        } else {
            self.file
                .seek(SeekFrom::Start(pos))
                .map_err(|_| FileLoaderError::SeekError)?;
        }
        self.pos = pos;
        Ok(())
    }

    /// Offset of the byte most recently returned by `read_byte`.
    fn tell_last(&self) -> Result<u64, FileLoaderError> {
        if let Some(cache) = self.cache.as_ref() {
            if cache.current.is_none() {
                return Err(FileLoaderError::CacheError);
            }
        }
        self.pos.checked_sub(1).ok_or(FileLoaderError::TellError)
    }

    fn read_byte(&mut self) -> Result<Option<u8>, FileLoaderError> {
        if self.cache.is_some() {
            if self.pos >= self.len {
                return Ok(None);
            }
            let index = self.block_for(self.pos)?;
            let Some(cache) = self.cache.as_ref() else {
                return Err(FileLoaderError::CacheError);
            };
            let slot = &cache.slots[index];
            let offset = (self.pos - slot.base) as usize;
            let Some(value) = slot.data.get(offset).copied() else {
                return Ok(None);
            };
            self.pos += 1;
            return Ok(Some(value));
        }

        let mut byte = [0u8; 1];
        match self.file.read_exact(&mut byte) {
            Ok(()) => {
                self.pos += 1;
                Ok(Some(byte[0]))
            }
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(_) => Err(FileLoaderError::Eof),
        }
    }

    fn read_at(&mut self, pos: u64, buffer: &mut [u8]) -> Result<(), FileLoaderError> {
        if self.cache.is_none() {
            self.seek(pos)?;
            self.file
                .read_exact(buffer)
                .map_err(|_| FileLoaderError::Eof)?;
            self.pos = pos + buffer.len() as u64;
            return Ok(());
        }

        let mut filled = 0usize;
        let mut cursor = pos;
        while filled < buffer.len() {
            let index = self.block_for(cursor)?;
            let Some(cache) = self.cache.as_ref() else {
                return Err(FileLoaderError::CacheError);
            };
            let slot = &cache.slots[index];
            let offset = (cursor - slot.base) as usize;
            let available = slot.data.len().saturating_sub(offset);
            if available == 0 {
                return Err(FileLoaderError::Eof);
            }
            let take = available.min(buffer.len() - filled);
            buffer[filled..filled + take].copy_from_slice(&slot.data[offset..offset + take]);
            filled += take;
            cursor += take as u64;
        }
        self.pos = cursor;
        Ok(())
    }

    fn block_for(&mut self, pos: u64) -> Result<usize, FileLoaderError> {
        let Some(cache) = self.cache.as_mut() else {
            return Err(FileLoaderError::CacheError);
        };
        if let Some(current) = cache.current {
            let slot = &cache.slots[current];
            if slot.loaded && pos >= slot.base && pos - slot.base < cache.block_size {
                return Ok(current);
            }
        }
        if let Some(found) = cache.slot_covering(pos) {
            cache.current = Some(found);
            return Ok(found);
        }

        let base = cache.aligned_base(pos);
        let victim = cache.victim_for(base);
        let block_size = cache.block_size as usize;
        if cache.slots[victim].loaded {
            tracing::debug!(
                slot = victim,
                old_base = cache.slots[victim].base,
                new_base = base,
                "node file cache eviction"
            );
        }

        self.file
            .seek(SeekFrom::Start(base))
            .map_err(|_| FileLoaderError::SeekError)?;
        let mut data = Vec::with_capacity(block_size);
        (&mut self.file)
            .take(block_size as u64)
            .read_to_end(&mut data)
            .map_err(|_| FileLoaderError::CacheError)?;
        if (data.len() as u64) < pos - base {
            cache.current = None;
            return Err(FileLoaderError::CacheError);
        }

        let slot = &mut cache.slots[victim];
        slot.loaded = true;
        slot.base = base;
        slot.data = data;
        cache.current = Some(victim);
        Ok(victim)
    }
}

#[derive(Debug)]
enum Mode {
    Closed,
    Read(ReadSource),
    Write(BufWriter<File>),
}

/// Reader and writer for the escaped node-tree file format.
///
/// A loader is either in read mode (`open_file`, the whole tree is parsed
/// into an arena up front) or in write mode (`create_file`, nodes are
/// emitted as the caller goes). Failed calls return the error and also
/// record it for `last_error`.
#[derive(Debug)]
pub struct FileLoader {
    mode: Mode,
    nodes: Vec<Node>,
    root: Option<NodeId>,
    scratch: Vec<u8>,
    last_error: Option<FileLoaderError>,
}

impl Default for FileLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl FileLoader {
    pub fn new() -> Self {
        Self {
            mode: Mode::Closed,
            nodes: Vec::new(),
            root: None,
            scratch: vec![0; INITIAL_SCRATCH],
            last_error: None,
        }
    }

    pub fn open(path: &Path, write: bool, caching: bool) -> Result<Self, FileLoaderError> {
        let mut loader = Self::new();
        if write {
            loader.create_file(path)?;
        } else {
            loader.open_file(path, caching)?;
        }
        Ok(loader)
    }

    pub fn last_error(&self) -> Option<FileLoaderError> {
        self.last_error
    }

    fn fail<T>(&mut self, err: FileLoaderError) -> Result<T, FileLoaderError> {
        self.last_error = Some(err);
        Err(err)
    }

    pub fn create_file(&mut self, path: &Path) -> Result<(), FileLoaderError> {
        self.nodes.clear();
        self.root = None;
        let file = match File::create(path) {
            Ok(file) => file,
            Err(_) => return self.fail(FileLoaderError::CanNotCreate),
        };
        self.mode = Mode::Write(BufWriter::new(file));
        self.write_data(&FILE_VERSION.to_le_bytes(), false)
    }

    pub fn open_file(&mut self, path: &Path, caching: bool) -> Result<(), FileLoaderError> {
        self.nodes.clear();
        self.root = None;
        self.mode = Mode::Closed;

        let file = match File::open(path) {
            Ok(file) => file,
            Err(_) => return self.fail(FileLoaderError::CanNotOpen),
        };
        let len = match file.metadata() {
            Ok(meta) => meta.len(),
            Err(_) => return self.fail(FileLoaderError::TellError),
        };
        let mut source = ReadSource {
            file: BufReader::new(file),
            len,
            pos: 0,
            cache: None,
        };

        let mut version = [0u8; 4];
        if source.read_at(0, &mut version).is_err() {
            return self.fail(FileLoaderError::Eof);
        }
        if u32::from_le_bytes(version) != FILE_VERSION {
            return self.fail(FileLoaderError::InvalidFileVersion);
        }
        if caching {
            source.cache = Some(BlockCache::for_file_size(len));
        }

        let result = Self::parse_tree(&mut source, &mut self.nodes);
        match result {
            Ok(root) => {
                tracing::debug!(
                    path = %path.display(),
                    nodes = self.nodes.len(),
                    caching,
                    "node file parsed"
                );
                self.root = Some(root);
                self.mode = Mode::Read(source);
                Ok(())
            }
            Err(err) => {
                self.nodes.clear();
                self.fail(err)
            }
        }
    }

    fn parse_tree(source: &mut ReadSource, nodes: &mut Vec<Node>) -> Result<NodeId, FileLoaderError> {
        source.seek(HEADER_LEN)?;
        if source.read_byte()? != Some(NODE_START) {
            return Err(FileLoaderError::InvalidFormat);
        }

        let root = NodeId(nodes.len());
        nodes.push(Node::at(HEADER_LEN));
        // (node, props_size already recorded)
        let mut stack: Vec<(NodeId, bool)> = vec![(root, false)];

        'node: loop {
            let Some(&(current, _)) = stack.last() else {
                return Ok(root);
            };
            let mut node_type = source.read_byte()?.ok_or(FileLoaderError::Eof)?;
            if node_type == ESCAPE_CHAR {
                node_type = source.read_byte()?.ok_or(FileLoaderError::Eof)?;
            }
            nodes[current.0].node_type = node_type;
            nodes[current.0].props_start = source.pos;

            loop {
                let Some(&(current, props_set)) = stack.last() else {
                    return Ok(root);
                };
                let byte = source.read_byte()?.ok_or(FileLoaderError::Eof)?;
                match byte {
                    NODE_START => {
                        let pos = source.tell_last()?;
                        let node = &mut nodes[current.0];
                        node.props_size = pos - node.props_start;
                        let child = NodeId(nodes.len());
                        nodes.push(Node::at(pos));
                        nodes[current.0].child = Some(child);
                        if let Some(frame) = stack.last_mut() {
                            frame.1 = true;
                        }
                        stack.push((child, false));
                        continue 'node;
                    }
                    NODE_END => {
                        if !props_set {
                            let pos = source.tell_last()?;
                            let node = &mut nodes[current.0];
                            node.props_size = pos - node.props_start;
                        }
                        match source.read_byte()? {
                            None => {
                                if stack.len() == 1 {
                                    return Ok(root);
                                }
                                return Err(FileLoaderError::Eof);
                            }
                            Some(NODE_START) => {
                                let pos = source.tell_last()?;
                                let sibling = NodeId(nodes.len());
                                nodes.push(Node::at(pos));
                                nodes[current.0].next = Some(sibling);
                                if let Some(frame) = stack.last_mut() {
                                    *frame = (sibling, false);
                                }
                                continue 'node;
                            }
                            Some(NODE_END) => {
                                let pos = source.tell_last()?;
                                source.seek(pos)?;
                                stack.pop();
                                if stack.is_empty() {
                                    return Ok(root);
                                }
                            }
                            Some(_) => return Err(FileLoaderError::InvalidFormat),
                        }
                    }
                    ESCAPE_CHAR => {
                        source.read_byte()?.ok_or(FileLoaderError::Eof)?;
                    }
                    _ => {}
                }
            }
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// First child of `parent`, or the root when `parent` is `None`.
    pub fn child(&self, parent: Option<NodeId>) -> Option<NodeId> {
        match parent {
            Some(id) => self.nodes.get(id.0).and_then(|node| node.child),
            None => self.root,
        }
    }

    pub fn next(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|node| node.next)
    }

    pub fn node_type(&self, node: NodeId) -> Option<u8> {
        self.nodes.get(node.0).map(|node| node.node_type)
    }

    pub fn children(&self, parent: NodeId) -> Children<'_> {
        Children {
            loader: self,
            next: self.child(Some(parent)),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn cache_block_size(&self) -> Option<u64> {
        match &self.mode {
            Mode::Read(source) => source.cache.as_ref().map(|cache| cache.block_size),
            _ => None,
        }
    }

    /// Unescaped property bytes of `node`. The slice borrows the loader's
    /// scratch buffer and is invalidated by the next call.
    pub fn get_props(&mut self, node: NodeId) -> Result<&[u8], FileLoaderError> {
        let Mode::Read(source) = &mut self.mode else {
            return self.fail(FileLoaderError::NotOpen);
        };
        let Some(entry) = self.nodes.get(node.0) else {
            self.last_error = Some(FileLoaderError::InvalidNode);
            return Err(FileLoaderError::InvalidNode);
        };
        let size = entry.props_size as usize;
        let start = entry.props_start;

        if size >= self.scratch.len() {
            let mut grown = self.scratch.len().max(1);
            while size >= grown {
                grown *= 2;
            }
            self.scratch = vec![0; grown];
        }

        if let Err(err) = source.read_at(start, &mut self.scratch[..size]) {
            self.last_error = Some(err);
            return Err(err);
        }
        let len = unescape_in_place(&mut self.scratch[..size]);
        Ok(&self.scratch[..len])
    }

    pub fn props_stream(&mut self, node: NodeId) -> Result<PropStream<'_>, FileLoaderError> {
        let props = self.get_props(node)?;
        Ok(PropStream::new(props))
    }

    pub fn start_node(&mut self, node_type: u8) -> Result<(), FileLoaderError> {
        self.write_data(&[NODE_START], false)?;
        self.write_data(&[node_type], true)
    }

    pub fn set_props(&mut self, data: &[u8]) -> Result<(), FileLoaderError> {
        self.write_data(data, true)
    }

    pub fn end_node(&mut self) -> Result<(), FileLoaderError> {
        self.write_data(&[NODE_END], false)
    }

    /// Flushes and closes a file opened for writing.
    pub fn finish(&mut self) -> Result<(), FileLoaderError> {
        let mode = std::mem::replace(&mut self.mode, Mode::Closed);
        match mode {
            Mode::Write(mut writer) => match writer.flush() {
                Ok(()) => Ok(()),
                Err(_) => self.fail(FileLoaderError::CouldNotWrite),
            },
            Mode::Read(source) => {
                self.mode = Mode::Read(source);
                Ok(())
            }
            Mode::Closed => self.fail(FileLoaderError::NotOpen),
        }
    }

    fn write_data(&mut self, data: &[u8], escape_reserved: bool) -> Result<(), FileLoaderError> {
        let Mode::Write(writer) = &mut self.mode else {
            return self.fail(FileLoaderError::NotOpen);
        };
        let result = if escape_reserved {
            writer.write_all(&escape(data))
        } else {
            writer.write_all(data)
        };
        match result {
            Ok(()) => Ok(()),
            Err(_) => self.fail(FileLoaderError::CouldNotWrite),
        }
    }
}

pub struct Children<'a> {
    loader: &'a FileLoader,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.loader.next(current);
        Some(current)
    }
}

pub fn is_reserved(byte: u8) -> bool {
    matches!(byte, NODE_START | NODE_END | ESCAPE_CHAR)
}

pub fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    for &byte in data {
        if is_reserved(byte) {
            out.push(ESCAPE_CHAR);
        }
        out.push(byte);
    }
    out
}

pub fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    let len = unescape_in_place(&mut out);
    out.truncate(len);
    out
}

fn unescape_in_place(buffer: &mut [u8]) -> usize {
    let mut read = 0;
    let mut write = 0;
    while read < buffer.len() {
        if buffer[read] == ESCAPE_CHAR {
            read += 1;
            if read >= buffer.len() {
                break;
            }
        }
        buffer[write] = buffer[read];
        read += 1;
        write += 1;
    }
    write
}
