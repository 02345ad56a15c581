//! Per-channel adapters.
//!
//! Each channel turns one kind of nondeterministic device traffic into log
//! records while recording and back into device effects while replaying.
//!
//! | Channel  | Records                                   | Live input in PLAY |
//! |----------|-------------------------------------------|--------------------|
//! | `chardev`| ASYNC+CHAR_READ, CHAR_WRITE, CHAR_READ_ALL | dropped            |
//! | `net`    | ASYNC+NET                                 | dropped            |
//! | `input`  | ASYNC+INPUT, ASYNC+INPUT_SYNC             | dropped            |
//! | `block`  | ASYNC+BLOCK                               | queued, id-matched |
//! | `random` | RANDOM                                    | not drawn          |
//! | `clock`  | CLOCK+kind                                | not read           |
//! | `audio`  | AUDIO_OUT, AUDIO_IN                       | overwritten        |

pub mod audio;
pub mod block;
pub mod chardev;
pub mod clock;
pub mod input;
pub mod net;
pub mod random;
