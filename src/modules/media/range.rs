use super::error::DeliveryError;

/// The first byte-range specifier of a `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// `bytes=start-end`
    Bounded { start: u64, end: u64 },
    /// `bytes=start-`
    From { start: u64 },
    /// `bytes=-len`
    Suffix { len: u64 },
}

impl ByteRange {
    /// Parses a `Range` header value. Only the first specifier of a
    /// multi-range request is kept.
    pub fn parse(value: &str) -> Result<Self, DeliveryError> {
        let bad = || DeliveryError::BadRange(value.to_string());

        let (unit, specs) = value.trim().split_once('=').ok_or_else(bad)?;
        if !unit.trim().eq_ignore_ascii_case("bytes") {
            return Err(bad());
        }

        let first = specs.split(',').next().ok_or_else(bad)?.trim();
        let (start, end) = first.split_once('-').ok_or_else(bad)?;
        let (start, end) = (start.trim(), end.trim());

        let parse = |s: &str| s.parse::<u64>().map_err(|_| bad());

        match (start.is_empty(), end.is_empty()) {
            (true, true) => Err(bad()),
            (true, false) => Ok(ByteRange::Suffix { len: parse(end)? }),
            (false, true) => Ok(ByteRange::From { start: parse(start)? }),
            (false, false) => {
                let (start, end) = (parse(start)?, parse(end)?);
                if start > end {
                    return Err(bad());
                }
                Ok(ByteRange::Bounded { start, end })
            }
        }
    }

    /// Resolves to inclusive `(start, end)` offsets within a resource of
    /// `length` bytes. The end is clamped to the last byte.
    pub fn resolve(self, length: u64) -> Result<(u64, u64), DeliveryError> {
        let unsatisfiable = DeliveryError::Unsatisfiable { length };
        if length == 0 {
            return Err(unsatisfiable);
        }
        let last = length - 1;

        match self {
            ByteRange::Bounded { start, end } => {
                if start > last {
                    return Err(unsatisfiable);
                }
                Ok((start, end.min(last)))
            }
            ByteRange::From { start } => {
                if start > last {
                    return Err(unsatisfiable);
                }
                Ok((start, last))
            }
            ByteRange::Suffix { len } => {
                if len == 0 {
                    return Err(unsatisfiable);
                }
                Ok((length.saturating_sub(len), last))
            }
        }
    }
}
