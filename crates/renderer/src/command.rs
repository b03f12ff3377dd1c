use std::fmt;

use crossbeam_channel::{bounded, Receiver, Sender};

/// Capacity of both the raw event queue and the command queue.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Commands understood by the command processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Rebuild the pass chain for the current shader set.
    LoadShader,
    /// Advance the shader library, then rebuild.
    NextShader,
    Quit,
    /// Reallocate render targets to the current source size.
    Resize,
    /// Ask the image provider for the next bitmap.
    LoadImage,
    /// A bitmap is waiting to be uploaded.
    ImageLoaded,
}

impl Command {
    /// Stable numeric code, logged alongside each processed command.
    pub const fn code(self) -> u8 {
        match self {
            Command::LoadShader => 0,
            Command::NextShader => 1,
            Command::Quit => 2,
            Command::Resize => 32,
            Command::LoadImage => 33,
            Command::ImageLoaded => 34,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Command::LoadShader => "load-shader",
            Command::NextShader => "next-shader",
            Command::Quit => "quit",
            Command::Resize => "resize",
            Command::LoadImage => "load-image",
            Command::ImageLoaded => "image-loaded",
        };
        f.write_str(name)
    }
}

/// Bounded command queue. Producers clone the sender; the processor is the
/// only consumer.
pub fn command_queue() -> (Sender<Command>, Receiver<Command>) {
    bounded(COMMAND_QUEUE_CAPACITY)
}
