//! Output length of the function-unit pipeline.
//!
//! Each opcode selects the first function unit a stream passes through.
//! Bit 0 of the attribute chains the stream into the next unit; the
//! attribute is shifted right by one at each hop, so at most two units run:
//!
//! ```text
//!   opcode 1 (expand, x2) ──attr&1──> opcode 2 (pass) ──attr&1──> opcode 3 (halve, /2)
//! ```
//!
//! Callers size destination buffers with this, so it must match the
//! hardware exactly.

/// No transform; output length equals input length.
pub const OP_COPY: i32 = 0;
/// Expansion unit: doubles the stream.
pub const OP_EXPAND: i32 = 1;
/// Pass-through unit.
pub const OP_PASS: i32 = 2;
/// Reduction unit: halves the stream.
pub const OP_HALVE: i32 = 3;

/// Compute the destination length for a request.
///
/// Returns `None` only when doubling overflows `usize`.
pub const fn compute_output_length(opcode: i32, attribute: i32, input: usize) -> Option<usize> {
    let mut unit = opcode;
    let mut attr = attribute;
    let mut len = input;

    if unit == OP_EXPAND {
        len = match len.checked_mul(2) {
            Some(doubled) => doubled,
            None => return None,
        };
        if attr & 1 != 0 {
            unit = OP_PASS;
            attr >>= 1;
        }
    }

    if unit == OP_PASS && attr & 1 != 0 {
        unit = OP_HALVE;
    }

    if unit == OP_HALVE {
        len /= 2;
    }

    Some(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_units() {
        assert_eq!(compute_output_length(OP_COPY, 0, 256), Some(256));
        assert_eq!(compute_output_length(OP_EXPAND, 0, 256), Some(512));
        assert_eq!(compute_output_length(OP_PASS, 0, 256), Some(256));
        assert_eq!(compute_output_length(OP_HALVE, 0, 256), Some(128));
    }

    #[test]
    fn test_chains() {
        // expand -> pass
        assert_eq!(compute_output_length(OP_EXPAND, 0b01, 256), Some(512));
        // expand -> pass -> halve
        assert_eq!(compute_output_length(OP_EXPAND, 0b11, 256), Some(256));
        // pass -> halve
        assert_eq!(compute_output_length(OP_PASS, 0b01, 256), Some(128));
        // expand without the first chain bit never reaches halve
        assert_eq!(compute_output_length(OP_EXPAND, 0b10, 256), Some(512));
    }

    #[test]
    fn test_copy_and_halve_ignore_attribute() {
        assert_eq!(compute_output_length(OP_COPY, 0xff, 192), Some(192));
        assert_eq!(compute_output_length(OP_HALVE, 0xff, 192), Some(96));
    }

    #[test]
    fn test_negative_attribute_chains() {
        // -1 has every bit set
        assert_eq!(compute_output_length(OP_EXPAND, -1, 64), Some(64));
    }

    #[test]
    fn test_expand_overflow() {
        assert_eq!(compute_output_length(OP_EXPAND, 0, usize::MAX), None);
    }
}
