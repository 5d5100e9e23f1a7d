//! A Rust implementation of semi-honest multi-party computation (MPC) based on the
//! [BGW](https://dl.acm.org/doi/10.1145/62212.62213) protocol over Shamir secret shares.
//!
//! This crate lets a number of parties, each holding a private value, jointly evaluate a public
//! arithmetic circuit without revealing their inputs beyond what the output implies. Every value
//! flowing through the circuit is represented as shares of a random polynomial of degree `T`,
//! and only the final output is ever reconstructed in the clear.
//!
//! ## Features
//!
//! - Arithmetic circuits of addition and multiplication gates over a prime field
//! - Shamir secret sharing with Lagrange interpolation in the field
//! - Degree reduction after every multiplication
//! - Content-addressed delivery of shares over an unordered communication channel
//!
//! ## Main Components
//!
//! The crate is structured into several modules:
//!
//! * [`protocol`]: The [`protocol::mpc`] function which executes the protocol for a single party.
//! * [`channel`]: Communication abstractions for exchanging data between parties.
//! * [`mailbox`]: Retrieves "the share party X sent for gate G" from a channel.
//! * [`circuit`]: Validated circuits of INPUT, ADD and MUL gates.
//! * [`sharing`]: Splitting values into shares and reconstructing them.
//! * [`field`]: Arithmetic modulo a prime.
//! * [`fixtures`]: Example circuits with private values for every party.
//!
//! ## Basic Usage
//!
//! To run an MPC computation, each participating party needs to:
//!
//! 1. Set up a channel to all other parties (and itself)
//! 2. Build the same [`circuit::Circuit`] as every other party
//! 3. Call the [`protocol::mpc`] function with its party id and private value
//! 4. Inspect the returned [`protocol::Outcome`]
//!
//! For simulated environments (testing/development), you can use the [`protocol::simulate_mpc`]
//! function.
//!
//! ## Example
//!
//! ```
//! use bgw::{config::Config, fixtures, protocol::simulate_mpc};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let fixture = fixtures::sum_of_five()?;
//! let outcomes = simulate_mpc(&fixture.circuit, &fixture.private_values, &Config::default())?;
//! for outcome in outcomes {
//!     assert_eq!(outcome.result().value(), 25);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Security Properties
//!
//! This implementation provides security against semi-honest adversaries controlling at most `T`
//! parties: they follow the protocol but may try to learn more from the messages they see.
//! Messages are neither encrypted nor authenticated, and all parties must stay available for
//! the whole run.
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod channel;
pub mod circuit;
pub mod config;
pub mod field;
pub mod fixtures;
pub mod mailbox;
pub mod protocol;
pub mod sharing;
