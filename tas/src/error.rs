use core::fmt;

/// The result type of the fast path state and queue operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Everything that can go wrong when operating on the shared state.
///
/// The variants are ordered roughly by how far they should travel. Queue and buffer conditions
/// (`WouldBlock`) are transient and handled where they occur by backing off. Structural failures
/// of the flow pool or the lookup table are permanent for the request and are reported to the
/// administrative layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The fixed pool or array has no free element left.
    ///
    /// Permanent for this request. Retrying only helps once another flow has been torn down.
    NoCapacity,

    /// A resource is temporarily unavailable.
    ///
    /// Returned for a full queue or insufficient buffer space. The caller should retry after the
    /// corresponding readiness notification, such as freed send buffer.
    WouldBlock,

    /// No element with the requested key or index exists.
    NotFound,

    /// All slots of the lookup bucket addressed by a hash are occupied.
    BucketFull,

    /// A bump notification carried an outdated sequence number.
    ///
    /// The bump was issued before the connection was moved or it is a duplicate. It has not been
    /// applied. This is never surfaced to applications, the fast path drops these silently.
    StaleSequence,

    /// The fast path has not finished its initialization.
    ///
    /// Distinct from a hard failure, polling the readiness again later may succeed.
    NotReady,

    /// The operation was not permitted in the current state.
    ///
    /// Examples are sending more bytes than were allocated or requesting to close a connection
    /// that is not open.
    Illegal,

    /// A record could not be parsed because it was shorter than its layout.
    Truncated,

    /// A record had a type tag that is not known to this implementation.
    Unrecognized,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NoCapacity    => write!(f, "no capacity left"),
            Error::WouldBlock    => write!(f, "operation would block"),
            Error::NotFound      => write!(f, "not found"),
            Error::BucketFull    => write!(f, "lookup bucket full"),
            Error::StaleSequence => write!(f, "stale bump sequence"),
            Error::NotReady      => write!(f, "fast path not ready"),
            Error::Illegal       => write!(f, "illegal operation"),
            Error::Truncated     => write!(f, "truncated record"),
            Error::Unrecognized  => write!(f, "unrecognized record type"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl Error {
    /// Whether retrying the same request later can succeed without any other change.
    pub fn is_transient(self) -> bool {
        matches!(self, Error::WouldBlock | Error::NotReady)
    }
}
