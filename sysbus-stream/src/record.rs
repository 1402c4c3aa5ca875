//! Typed decoding of notification payloads.

use bus_client::BusValue;

/// A record decoded from the arguments of a matching notification.
///
/// `decode` must fail closed: return `None` when there are too few
/// arguments or one of them has the wrong type. Trailing extra arguments
/// are ignored.
pub trait SignalRecord: Sized + Send + 'static {
    fn decode(args: &[BusValue]) -> Option<Self>;
}

impl SignalRecord for u32 {
    fn decode(args: &[BusValue]) -> Option<Self> {
        args.first()?.as_u32()
    }
}

impl<const N: usize> SignalRecord for [u32; N] {
    fn decode(args: &[BusValue]) -> Option<Self> {
        if args.len() < N {
            return None;
        }
        let mut out = [0u32; N];
        for (slot, arg) in out.iter_mut().zip(args) {
            *slot = arg.as_u32()?;
        }
        Some(out)
    }
}
