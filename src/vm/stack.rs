use crate::vm::error::Error;
use crate::vm::frame::Frame;

/// The frames of a thread, bottom first. The last frame is the current one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadStack {
    frames: Vec<Frame>,
}

impl ThreadStack {
    pub fn new() -> Self {
        ThreadStack::default()
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Result<Frame, Error> {
        self.frames.pop().ok_or(Error::ThreadStackEmpty)
    }

    pub fn current(&self) -> Result<&Frame, Error> {
        self.frames.last().ok_or(Error::ThreadStackEmpty)
    }

    pub fn current_mut(&mut self) -> Result<&mut Frame, Error> {
        self.frames.last_mut().ok_or(Error::ThreadStackEmpty)
    }

    pub fn height(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Bottom to top.
    pub fn iter(&self) -> std::slice::Iter<Frame> {
        self.frames.iter()
    }
}
