//! End-to-end integration tests for the provisioner authorization core.
//!
//! These tests exercise the full path:
//! - Provisioner configuration JSON to an initialized collection
//! - Method dispatch and per-provisioner authorization
//! - Applying sign options and issuing a certificate
//! - Resolving the issuing provisioner from the certificate extension

#![cfg(test)]
