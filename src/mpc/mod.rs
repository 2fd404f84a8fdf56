pub mod comparison;
pub mod dgk;
pub mod enc_argmax;
pub mod enc_comparison;
pub mod lsic;
pub mod millionaire;
pub mod rev_enc_comparison;
