//! Wire format detection from the first bytes of a file

use edi_ir::Format;

/// Bytes read before deciding
pub const PREFIX_LENGTH: usize = 128;

/// What a file looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detected {
    Supported(Format),
    /// An ANSI X12 interchange (ISA header), which this translator does not read
    X12,
    Unknown,
}

pub fn detect(prefix: &[u8]) -> Detected {
    let prefix = &prefix[..prefix.len().min(PREFIX_LENGTH)];
    if edi_adapter_edifact::syntax::is_edifact(prefix) {
        Detected::Supported(Format::Edifact)
    } else if edi_adapter_tradacoms::syntax::is_tradacoms(prefix) {
        Detected::Supported(Format::Tradacoms)
    } else if edi_adapter_ach::syntax::is_ach(prefix) {
        Detected::Supported(Format::Ach)
    } else if prefix.trim_ascii_start().starts_with(b"ISA") {
        Detected::X12
    } else {
        Detected::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(detect(b"UNA:+.? 'UNB+UNOC:3"), Detected::Supported(Format::Edifact));
        assert_eq!(detect(b"\nUNB+UNOA:3+S+R"), Detected::Supported(Format::Edifact));
        assert_eq!(detect(b"STX=ANA:1+S+R+240101+REF'"), Detected::Supported(Format::Tradacoms));
        let ach = format!("{:<94}", "101 09100001912345678902401011200A094101FIRST BANK");
        assert_eq!(detect(ach.as_bytes()), Detected::Supported(Format::Ach));
        assert_eq!(detect(b"ISA*00*          *00*"), Detected::X12);
        assert_eq!(detect(b"<?xml version=\"1.0\"?>"), Detected::Unknown);
        assert_eq!(detect(b""), Detected::Unknown);
    }
}
