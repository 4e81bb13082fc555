use crate::core::Pos;
use log::debug;
use thiserror::Error;

/// Errors produced by streamed trajectory sources
#[derive(Error, Debug)]
pub enum FrameSourceError {
    /// A frame's atom count disagrees with the consuming structure
    #[error("frame {0} has {1} atoms, expected {2}")]
    AtomCount(usize, usize, usize),

    /// The source ran out of frames before its declared frame count
    #[error("trajectory source exhausted after {0} frames")]
    Exhausted(usize),

    /// Error reported by the underlying reader
    #[error("read error: {0}")]
    Read(String),
}

/// Contract for a streamed trajectory collaborator.
///
/// An implementation wraps an already-opened trajectory handle whose
/// frame count became known on opening. The consumer calls
/// [read_next_frame](FrameSource::read_next_frame) for the fixed frame
/// count and [close](FrameSource::close) once at the end. Reads are
/// sequential and blocking; a read error ends the scan outright.
pub trait FrameSource {
    /// Number of frames the source will deliver.
    fn n_frames(&self) -> usize;

    /// Reads the next frame's coordinates.
    fn read_next_frame(&mut self) -> Result<Vec<Pos>, FrameSourceError>;

    /// Releases the underlying handle.
    fn close(&mut self) -> Result<(), FrameSourceError>;
}

/// In-memory trajectory adapter serving pre-loaded frames one call at
/// a time, the way a one-structure-per-call reader does. Also the test
/// double for the streamed calculations.
pub struct MemoryFrameSource {
    frames: std::vec::IntoIter<Vec<Pos>>,
    n_frames: usize,
    delivered: usize,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<Vec<Pos>>) -> Self {
        let n_frames = frames.len();
        debug!("opened in-memory trajectory of {n_frames} frames");
        Self {
            frames: frames.into_iter(),
            n_frames,
            delivered: 0,
        }
    }
}

impl FrameSource for MemoryFrameSource {
    fn n_frames(&self) -> usize {
        self.n_frames
    }

    fn read_next_frame(&mut self) -> Result<Vec<Pos>, FrameSourceError> {
        match self.frames.next() {
            Some(f) => {
                self.delivered += 1;
                Ok(f)
            }
            None => Err(FrameSourceError::Exhausted(self.delivered)),
        }
    }

    fn close(&mut self) -> Result<(), FrameSourceError> {
        debug!("closed in-memory trajectory after {} frames", self.delivered);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_delivers_then_exhausts() {
        let mut src = MemoryFrameSource::new(vec![vec![Pos::origin()]]);
        assert_eq!(src.n_frames(), 1);
        assert!(src.read_next_frame().is_ok());
        assert!(matches!(
            src.read_next_frame(),
            Err(FrameSourceError::Exhausted(1))
        ));
        assert!(src.close().is_ok());
    }
}
