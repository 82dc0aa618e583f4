//! Handle: integer key types a `HandleTable` can issue.

use core::fmt::Debug;
use core::hash::Hash;

/// An integer type usable as a table handle.
///
/// The counter starts at [`Handle::ZERO`] and is advanced with
/// [`Handle::checked_next`] before each issue, so the first handle a table
/// hands out is `ZERO + 1`. Advancing past the type's maximum yields `None`
/// and the table reports exhaustion instead of wrapping.
pub trait Handle: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {
    /// Counter value of a fresh table. Never issued as a handle.
    const ZERO: Self;

    /// The successor of `self`, or `None` on overflow.
    fn checked_next(self) -> Option<Self>;
}

macro_rules! impl_handle {
    ($($t:ty),* $(,)?) => {
        $(
            impl Handle for $t {
                const ZERO: Self = 0;

                #[inline]
                fn checked_next(self) -> Option<Self> {
                    self.checked_add(1)
                }
            }
        )*
    };
}

impl_handle!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);
