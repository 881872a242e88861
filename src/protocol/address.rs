//! Endpoint addresses
//!
//! Every participant is located by a `scheme://host:port` string. Two
//! roles exist for the same address: the *connect* form (concrete host,
//! used by the dialing side) and the *bind* form (wildcard host, used by
//! the listening side). Registrations always carry the connect form; the
//! side that listens derives the bind form itself.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Wildcard host used by the bind form
const WILDCARD_HOST: &str = "0.0.0.0";

/// A `scheme://host:port` endpoint address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    /// Transport scheme (e.g. `tcp`)
    pub scheme: String,
    /// Host name or IP address
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Address {
    /// Create an address from parts
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// TCP address on a concrete host, the common case
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new("tcp", host, port)
    }

    /// The bind form: same scheme and port, wildcard host.
    ///
    /// Used by the listening side so that a peer can advertise a concrete
    /// host while binding all interfaces.
    pub fn bind_form(&self) -> Address {
        Address::new(self.scheme.clone(), WILDCARD_HOST, self.port)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress(s.to_string());

        let (scheme, rest) = s.split_once("://").ok_or_else(invalid)?;
        let (host, port) = rest.rsplit_once(':').ok_or_else(invalid)?;

        if scheme.is_empty() || host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;

        Ok(Address::new(scheme, host, port))
    }
}
