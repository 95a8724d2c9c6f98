use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Frame delimiter. Never appears inside a stuffed frame.
pub const DELIMITER: u8 = 0x00;

/// Bytes a stuffed frame carries beyond its payload: the leading code byte
/// and the trailing delimiter.
pub const FRAME_OVERHEAD: usize = 2;

/// Largest run a single code byte can describe.
const MAX_RUN_CODE: u8 = 0xFF;

/// Unstuff one delimited frame into `dst`.
///
/// `frame` runs from the first code byte through the trailing delimiter.
/// Each code byte `c` is followed by `c - 1` literal bytes; every group except
/// one ending exactly at the last input byte, or one with `c == 0xFF`, stands
/// for a zero in the payload. Returns the payload length, which always equals
/// `frame.len() - 2`; the payload occupies `dst[..len]`.
///
/// ```text
/// stuffed  03 AA BB 01 00
/// payload  AA BB 00
/// ```
pub fn unstuff(frame: &[u8], dst: &mut [u8]) -> Result<usize> {
    let len = frame.len();
    if len < FRAME_OVERHEAD {
        return Err(FrameError::EmptyFrame);
    }
    if dst.len() < len {
        return Err(FrameError::OutputTooSmall {
            available: dst.len(),
            needed: len,
        });
    }

    let mut read = 0usize;
    let mut written = 0usize;
    while read < len {
        let offset = read;
        let code = frame[read];
        read += 1;

        if read + code as usize > len && code != 1 {
            return Err(FrameError::Desync { code, offset, len });
        }

        let run = (code as usize).saturating_sub(1);
        dst[written..written + run].copy_from_slice(&frame[read..read + run]);
        written += run;
        read += run;

        if code < MAX_RUN_CODE && read != len {
            dst[written] = 0;
            written += 1;
        }
    }

    // The group in front of the delimiter always emits one zero too many.
    let expected = len - FRAME_OVERHEAD;
    if written.checked_sub(1) != Some(expected) {
        return Err(FrameError::Integrity {
            written,
            len,
            expected,
        });
    }
    Ok(expected)
}

/// Stuff `payload` and append it, delimiter included, to `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────┬─────┬──────────┬──────────────┬───────────┐
/// │ code (1B)│ code-1 bytes │ ... │ code (1B)│ code-1 bytes │ 0x00      │
/// └──────────┴──────────────┴─────┴──────────┴──────────────┴───────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len() + payload.len() / 254 + FRAME_OVERHEAD);

    let mut code_index = dst.len();
    dst.put_u8(0);
    let mut code = 1u8;

    for &byte in payload {
        if byte == DELIMITER {
            dst[code_index] = code;
            code_index = dst.len();
            dst.put_u8(0);
            code = 1;
            continue;
        }

        dst.put_u8(byte);
        code += 1;
        if code == MAX_RUN_CODE {
            dst[code_index] = code;
            code_index = dst.len();
            dst.put_u8(0);
            code = 1;
        }
    }

    dst[code_index] = code;
    dst.put_u8(DELIMITER);
}
