pub mod elgamal;
pub mod gm;
pub mod paillier;

use num_bigint_dig::BigInt;
use num_integer::Integer;
use num_traits::One;

/// Bit `i` of a non-negative integer.
pub fn bit_of(v: &BigInt, i: usize) -> bool {
    (v >> i).is_odd()
}

/// The low `bits` bits of `v`, i.e. `v mod 2^bits`.
pub fn low_bits(v: &BigInt, bits: usize) -> BigInt {
    v.mod_floor(&(BigInt::one() << bits))
}
