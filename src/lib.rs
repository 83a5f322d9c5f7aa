// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Takashi Sakamoto

#![doc = include_str!("../README.md")]

pub mod block;
pub mod music;
pub mod specifier;
pub mod transfer;

/// The interface to initiate request transaction with quadlet-aligned frame and wait for
/// response transaction, implemented by the transport layer.
///
/// The request frame is a series of big-endian quadlets. The implementation should serialize
/// concurrent calls so that a single transaction is in flight in the bus at once, and should
/// handle bus-level timeout by itself; the caller of the trait treats the lack of response and
/// the response with unexpected status code uniformly as one retryable failure.
pub trait TransactionChannel {
    /// Transmit the given request frame to the node and return the received response frame, or
    /// None when the transaction fails at bus level.
    fn execute(&self, node_id: u32, request: &[u32], response_quadlets: usize)
        -> Option<Vec<u32>>;
}
