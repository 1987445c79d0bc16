// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Account credentials.
//!
//! [`TokenStore`] keeps the OAuth token set of one account in memory. The
//! refresh itself is performed by [`ApiClient::refresh`](crate::protocol::ApiClient::refresh)
//! whenever the REST layer sees an authentication failure. [`jwt`] reads the
//! issuer claim the real-time channel needs for its identity exchange.

pub mod jwt;
mod token;

pub use token::TokenStore;
