//! Human input events (keyboard, mouse, touch) carried by `ASYNC+INPUT`.

use crate::codec::{LogReader, LogWriter};
use crate::error::LogError;
use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, Write};

const INPUT_KEY: u32 = 0;
const INPUT_BTN: u32 = 1;
const INPUT_REL: u32 = 2;
const INPUT_ABS: u32 = 3;
const INPUT_MTT: u32 = 4;

const KEY_NUMBER: u32 = 0;
const KEY_QCODE: u32 = 1;

/// How a key is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyValue {
    /// Raw scancode number.
    Number(i64),
    /// Symbolic key code.
    Qcode(u32),
}

/// A single input event delivered to the guest's input devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    Key { key: KeyValue, down: bool },
    Btn { button: u32, down: bool },
    Rel { axis: u32, value: i64 },
    Abs { axis: u32, value: i64 },
    Mtt {
        kind: u32,
        slot: i64,
        tracking_id: i64,
        axis: u32,
        value: i64,
    },
}

impl InputEvent {
    pub fn encode<W: Write + Seek>(&self, w: &mut LogWriter<W>) {
        match self {
            Self::Key { key, down } => {
                w.put_dword(INPUT_KEY);
                match key {
                    KeyValue::Number(n) => {
                        w.put_dword(KEY_NUMBER);
                        w.put_i64(*n);
                    }
                    KeyValue::Qcode(q) => {
                        w.put_dword(KEY_QCODE);
                        w.put_dword(*q);
                    }
                }
                w.put_byte(u8::from(*down));
            }
            Self::Btn { button, down } => {
                w.put_dword(INPUT_BTN);
                w.put_dword(*button);
                w.put_byte(u8::from(*down));
            }
            Self::Rel { axis, value } => {
                w.put_dword(INPUT_REL);
                w.put_dword(*axis);
                w.put_i64(*value);
            }
            Self::Abs { axis, value } => {
                w.put_dword(INPUT_ABS);
                w.put_dword(*axis);
                w.put_i64(*value);
            }
            Self::Mtt {
                kind,
                slot,
                tracking_id,
                axis,
                value,
            } => {
                w.put_dword(INPUT_MTT);
                w.put_dword(*kind);
                w.put_i64(*slot);
                w.put_i64(*tracking_id);
                w.put_dword(*axis);
                w.put_i64(*value);
            }
        }
    }

    pub fn decode<R: Read + Seek>(r: &mut LogReader<R>) -> Result<Self, LogError> {
        let event = match r.get_dword()? {
            INPUT_KEY => {
                let key = match r.get_dword()? {
                    KEY_NUMBER => KeyValue::Number(r.get_i64()?),
                    KEY_QCODE => KeyValue::Qcode(r.get_dword()?),
                    other => return Err(LogError::UnknownKeyType(other)),
                };
                Self::Key {
                    key,
                    down: r.get_byte()? != 0,
                }
            }
            INPUT_BTN => Self::Btn {
                button: r.get_dword()?,
                down: r.get_byte()? != 0,
            },
            INPUT_REL => Self::Rel {
                axis: r.get_dword()?,
                value: r.get_i64()?,
            },
            INPUT_ABS => Self::Abs {
                axis: r.get_dword()?,
                value: r.get_i64()?,
            },
            INPUT_MTT => Self::Mtt {
                kind: r.get_dword()?,
                slot: r.get_i64()?,
                tracking_id: r.get_i64()?,
                axis: r.get_dword()?,
                value: r.get_i64()?,
            },
            other => return Err(LogError::UnknownInputType(other)),
        };
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reread(events: &[InputEvent]) -> Result<Vec<InputEvent>, LogError> {
        let mut w = LogWriter::create(Cursor::new(Vec::new()));
        for e in events {
            e.encode(&mut w);
        }
        w.finalize();
        let mut r = LogReader::open(Cursor::new(w.into_inner().into_inner()))?;
        events.iter().map(|_| InputEvent::decode(&mut r)).collect()
    }

    #[test]
    fn key_press_and_release() {
        let events = vec![
            InputEvent::Key {
                key: KeyValue::Qcode(30),
                down: true,
            },
            InputEvent::Key {
                key: KeyValue::Number(-1),
                down: false,
            },
            InputEvent::Mtt {
                kind: 2,
                slot: 1,
                tracking_id: 9,
                axis: 1,
                value: 512,
            },
        ];
        assert_eq!(reread(&events).unwrap(), events);
    }

    #[test]
    fn unknown_input_type_is_rejected() {
        let mut w = LogWriter::create(Cursor::new(Vec::new()));
        w.put_dword(99);
        w.finalize();
        let mut r = LogReader::open(Cursor::new(w.into_inner().into_inner())).unwrap();
        assert!(matches!(
            InputEvent::decode(&mut r),
            Err(LogError::UnknownInputType(99))
        ));
    }
}
