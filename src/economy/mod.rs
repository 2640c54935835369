//! Client for the on-chain token economy program
//!
//! Covers PDA derivation, the byte-exact instruction codec, account state
//! decoding and the high-level operation surface in [`client`].

pub mod accounts;
pub mod client;
pub mod instruction;
pub mod pda;
pub mod program;

pub use accounts::{ConnectionAccount, GlobalState, UserAccount};
pub use client::{
    InitializeOutcome, MintOutcome, TokenEconomyClient, UnlockOutcome, UserBalances,
};
pub use program::{PROGRAM_ID, PROGRAM_ID_STR};
