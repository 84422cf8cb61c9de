//! puf peripheral
//!
//! a stand-in for a physically unclonable function. the device exposes a
//! 0x20 byte window of 64-bit little-endian registers:
//!
//! | Offset | Name      | Read                        | Write                      |
//! |--------|-----------|-----------------------------|----------------------------|
//! | 0x00   | challenge | current challenge           | sets challenge             |
//! | 0x08   | response  | f(secret, challenge, latch) | ignored                    |
//! | 0x10   | disable   | latch in bit 0              | ors bit 0 into the latch   |
//!
//! only 8-byte accesses at 8-byte aligned offsets are valid. everything
//! else is a guest error: it is logged, reads answer 0, and no state
//! changes. the device never faults its caller.
//!
//! the disable latch is a one-time fuse: once set it stays set for the
//! lifetime of the device.
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::context::Address;
use crate::peripheral::traits::MappedPeripheral;

/// size of the register window in bytes
pub const PUF_SIZE: u64 = 0x20;

pub const PUF_CHALLENGE: u64 = 0x00;
pub const PUF_RESPONSE: u64 = 0x08;
pub const PUF_DISABLE: u64 = 0x10;

/// placeholder response returned by [`PlaceholderResponse`]
pub const PUF_PLACEHOLDER_RESPONSE: u64 = 0xDEADBEEF;

/// the response derivation of a puf
///
/// implementations must be pure: the same secret, challenge and latch
/// state always give the same response. the disabled case is routed
/// through here as well so it can be swapped in one place.
pub trait PufResponse: Send + Sync {
    fn respond(&self, secret: u64, challenge: u64, disabled: bool) -> u64;
}

impl<F> PufResponse for F
where
    F: Fn(u64, u64, bool) -> u64 + Send + Sync,
{
    fn respond(&self, secret: u64, challenge: u64, disabled: bool) -> u64 {
        self(secret, challenge, disabled)
    }
}

/// the response function of the sanctum board: a fixed constant
///
/// no real derivation exists yet, see DESIGN.md
#[derive(Clone, Copy, Debug, Default)]
pub struct PlaceholderResponse;

impl PufResponse for PlaceholderResponse {
    fn respond(&self, _secret: u64, _challenge: u64, _disabled: bool) -> u64 {
        PUF_PLACEHOLDER_RESPONSE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Register {
    Challenge,
    Response,
    Disable,
}

/// register decode for reads: exact offsets only
const READ_MAP: &[(Range<u64>, Register)] = &[
    (PUF_CHALLENGE..PUF_CHALLENGE + 8, Register::Challenge),
    (PUF_RESPONSE..PUF_RESPONSE + 8, Register::Response),
    (PUF_DISABLE..PUF_DISABLE + 8, Register::Disable),
];

/// register decode for writes, last matching entry wins
///
/// challenge claims the window from its base upward; response and
/// disable are carved out of it. an aligned write at 0x18 therefore
/// lands in challenge.
const WRITE_MAP: &[(Range<u64>, Register)] = &[
    (PUF_CHALLENGE..PUF_SIZE, Register::Challenge),
    (PUF_RESPONSE..PUF_RESPONSE + 8, Register::Response),
    (PUF_DISABLE..PUF_DISABLE + 8, Register::Disable),
];

fn decode(map: &[(Range<u64>, Register)], offset: u64) -> Option<Register> {
    map.iter()
        .rev()
        .find(|(range, _)| range.contains(&offset))
        .map(|(_, reg)| *reg)
}

#[derive(Clone)]
pub struct Puf {
    base: Address,
    secret: u64,
    challenge: u64,
    disabled: bool,
    response: Arc<dyn PufResponse>,
}

impl Puf {

    /// create a puf at `base` holding `secret`, using the placeholder response
    pub fn new(base: impl Into<Address>, secret: u64) -> Self {
        Self::with_response(base, secret, PlaceholderResponse)
    }

    /// create a puf with a custom response derivation
    pub fn with_response(
        base: impl Into<Address>,
        secret: u64,
        response: impl PufResponse + 'static,
    ) -> Self {
        Self {
            base: base.into(),
            secret,
            challenge: 0,
            disabled: false,
            response: Arc::new(response),
        }
    }

    pub fn challenge(&self) -> u64 {
        self.challenge
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// the value currently presented in the response register
    pub fn response(&self) -> u64 {
        self.response.respond(self.secret, self.challenge, self.disabled)
    }

    fn valid_access(offset: u64, size: usize) -> bool {
        offset % 8 == 0 && size == 8
    }

    /// read the 64-bit register at `offset`
    pub fn read_reg(&self, offset: u64, size: usize) -> u64 {
        if !Self::valid_access(offset, size) {
            log::warn!(target: "guest_error", "puf: invalid read size {} @ {:#x}", size, offset);
            return 0;
        }
        match decode(READ_MAP, offset) {
            Some(Register::Challenge) => self.challenge,
            Some(Register::Response) => self.response(),
            Some(Register::Disable) => self.disabled as u64,
            None => {
                log::warn!(target: "guest_error", "puf: no register for read size {} @ {:#x}", size, offset);
                0
            },
        }
    }

    /// write the 64-bit register at `offset`
    pub fn write_reg(&mut self, offset: u64, value: u64, size: usize) {
        if !Self::valid_access(offset, size) {
            log::warn!(target: "guest_error", "puf: invalid write size {} @ {:#x}", size, offset);
            return;
        }
        match decode(WRITE_MAP, offset) {
            Some(Register::Challenge) => self.challenge = value,
            Some(Register::Response) => (),
            // the latch is one bit long and cannot be cleared
            Some(Register::Disable) => self.disabled |= value & 1 == 1,
            None => {
                log::warn!(target: "guest_error", "puf: no register for write size {} @ {:#x}", size, offset);
            },
        }
    }
}

impl fmt::Debug for Puf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // the secret is never exposed
        f.debug_struct("Puf")
            .field("base", &self.base)
            .field("challenge", &self.challenge)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl MappedPeripheral for Puf {

    fn name(&self) -> &str {
        "puf"
    }

    fn base(&self) -> Address {
        self.base
    }

    fn size(&self) -> u64 {
        PUF_SIZE
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) {
        let value = self.read_reg(offset, buf.len());
        if buf.len() == 8 {
            LittleEndian::write_u64(buf, value);
        } else {
            buf.fill(0);
        }
    }

    fn write(&mut self, offset: u64, bytes: &[u8]) {
        let value = if bytes.len() == 8 { LittleEndian::read_u64(bytes) } else { 0 };
        self.write_reg(offset, value, bytes.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: u64 = 0xDEADBEEFABADCAFE;

    fn read(puf: &mut Puf, offset: u64) -> u64 {
        let mut buf = [0xffu8; 8];
        puf.read(offset, &mut buf);
        LittleEndian::read_u64(&buf)
    }

    fn write(puf: &mut Puf, offset: u64, value: u64) {
        let mut buf = [0u8; 8];
        LittleEndian::write_u64(&mut buf, value);
        puf.write(offset, &buf);
    }

    #[test]
    fn test_challenge_round_trip() {
        let mut puf = Puf::new(0x200000u64, SECRET);
        for value in [0u64, 1, 0x1234, u64::MAX, 0x8000_0000_0000_0001] {
            write(&mut puf, PUF_CHALLENGE, value);
            assert_eq!(read(&mut puf, PUF_CHALLENGE), value, "challenge round trip");
        }
    }

    #[test]
    fn test_disable_latch_is_sticky() {
        let mut puf = Puf::new(0x200000u64, SECRET);
        assert_eq!(read(&mut puf, PUF_DISABLE), 0);

        // only bit 0 counts
        write(&mut puf, PUF_DISABLE, 0xfffe);
        assert_eq!(read(&mut puf, PUF_DISABLE), 0);

        write(&mut puf, PUF_DISABLE, 1);
        assert_eq!(read(&mut puf, PUF_DISABLE), 1);

        for value in [0u64, 2, 0xfffe, 1, 0] {
            write(&mut puf, PUF_DISABLE, value);
            assert_eq!(read(&mut puf, PUF_DISABLE), 1, "latch cleared by write of {:#x}", value);
        }
        assert!(puf.is_disabled());
    }

    #[test]
    fn test_response_is_read_only() {
        let mut puf = Puf::with_response(0x200000u64, SECRET, |secret: u64, challenge: u64, disabled: bool| {
            if disabled { 0 } else { secret ^ challenge }
        });
        write(&mut puf, PUF_CHALLENGE, 0x1111);
        let expected = SECRET ^ 0x1111;
        assert_eq!(read(&mut puf, PUF_RESPONSE), expected);

        for value in [0u64, u64::MAX, 0x1234] {
            write(&mut puf, PUF_RESPONSE, value);
            assert_eq!(read(&mut puf, PUF_RESPONSE), expected, "response changed by a write");
        }
        assert_eq!(puf.challenge(), 0x1111, "response writes must not touch challenge");

        // the latch feeds the same derivation
        write(&mut puf, PUF_DISABLE, 1);
        assert_eq!(read(&mut puf, PUF_RESPONSE), 0);
    }

    #[test]
    fn test_placeholder_response() {
        let mut puf = Puf::new(0x200000u64, SECRET);
        assert_eq!(read(&mut puf, PUF_RESPONSE), PUF_PLACEHOLDER_RESPONSE);
        write(&mut puf, PUF_DISABLE, 1);
        assert_eq!(read(&mut puf, PUF_RESPONSE), PUF_PLACEHOLDER_RESPONSE);
    }

    #[test]
    fn test_invalid_access_is_a_noop() {
        env_logger::try_init().ok();

        let mut puf = Puf::new(0x200000u64, SECRET);
        write(&mut puf, PUF_CHALLENGE, 0x42);

        for offset in 0..PUF_SIZE {
            for size in [1usize, 2, 4, 8] {
                if (offset % 8 == 0 && size == 8) || offset + size as u64 > PUF_SIZE {
                    continue;
                }
                let mut buf = vec![0xffu8; size];
                puf.read(offset, &mut buf);
                assert!(buf.iter().all(|b| *b == 0), "invalid read must answer 0");

                puf.write(offset, &vec![0xffu8; size]);
                assert_eq!(puf.challenge(), 0x42, "invalid write changed challenge");
                assert!(!puf.is_disabled(), "invalid write set the latch");
            }
        }
    }

    #[test]
    fn test_narrow_read_at_challenge() {
        let mut puf = Puf::new(0x200000u64, SECRET);
        write(&mut puf, PUF_CHALLENGE, 0x1234);

        let mut buf = [0xffu8; 4];
        puf.read(PUF_CHALLENGE, &mut buf);
        assert_eq!(buf, [0u8; 4]);
        assert_eq!(puf.challenge(), 0x1234);
        assert!(!puf.is_disabled());
    }

    #[test]
    fn test_trailing_offset() {
        let mut puf = Puf::new(0x200000u64, SECRET);

        // reads of the unused slot answer 0
        write(&mut puf, PUF_CHALLENGE, 7);
        assert_eq!(read(&mut puf, 0x18), 0);

        // writes to it fall through to challenge
        write(&mut puf, 0x18, 0x99);
        assert_eq!(read(&mut puf, PUF_CHALLENGE), 0x99);
        assert!(!puf.is_disabled());
    }

    #[test]
    fn test_write_decode_order() {
        assert_eq!(decode(WRITE_MAP, 0x00), Some(Register::Challenge));
        assert_eq!(decode(WRITE_MAP, 0x08), Some(Register::Response));
        assert_eq!(decode(WRITE_MAP, 0x10), Some(Register::Disable));
        assert_eq!(decode(WRITE_MAP, 0x18), Some(Register::Challenge));
        assert_eq!(decode(WRITE_MAP, 0x20), None);
        assert_eq!(decode(READ_MAP, 0x18), None);
    }

    #[test]
    fn test_debug_hides_secret() {
        let puf = Puf::new(0x200000u64, SECRET);
        let text = format!("{:?}", puf);
        assert!(!text.contains(&format!("{}", SECRET)));
        assert!(!text.to_lowercase().contains("deadbeefabadcafe"));
    }
}
