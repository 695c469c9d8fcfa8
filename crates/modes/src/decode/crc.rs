/**
 * The 24-bit Mode S parity/CRC.
 *
 * Mode S protects every reply with a 24-bit CRC computed with the generator
 * polynomial 0x1FFF409 (MSB first). For DF 17/18 the transmitted 24 bits are
 * the CRC of the preceding bits, so a valid message produces a zero syndrome.
 * For the surveillance replies (DF 0/4/5/11/16/20/21) the transmitted field
 * is that CRC XORed with the interrogator/ICAO address, so the syndrome
 * recovers (or validates) the address instead of being zero.
 */
use deku::DekuError;

/// Generator polynomial for the Mode S CRC, 0x1FFF409 (25 bits, MSB implicit).
const GENERATOR: u32 = 0x1FFF409;

/// Compute the Mode S CRC syndrome over `bits` bits of `data`.
///
/// `data` must hold at least `bits / 8` bytes; `bits` is 56 for a short
/// message or 112 for a long one, i.e. the whole frame including its
/// trailing 24-bit field. The result is 0 for an untampered DF 17/18
/// message, and the candidate ICAO address (or interrogator-XORed
/// equivalent) for the surveillance formats.
pub fn modes_checksum(
    data: &[u8],
    bits: usize,
) -> Result<u32, DekuError> {
    let nbytes = bits / 8;
    if data.len() < nbytes {
        return Err(DekuError::Assertion(
            "Mode S CRC: not enough bytes for the announced length"
                .to_string(),
        ));
    }

    let mut rem: u32 = 0;
    for i in 0..bits {
        let byte = data[i / 8];
        let bit = (byte >> (7 - (i % 8))) & 1;
        rem = (rem << 1) | bit as u32;
        if rem & 0x0100_0000 != 0 {
            rem ^= GENERATOR;
        }
        rem &= 0x00FF_FFFF;
    }
    Ok(rem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_adsb_syndrome_is_zero() {
        let frame =
            hex::decode("8D4840D6202CC371C32CE0576098").unwrap();
        assert_eq!(modes_checksum(&frame, 112).unwrap(), 0);
    }

    #[test]
    fn corrupted_adsb_syndrome_is_nonzero() {
        let mut frame =
            hex::decode("8D4840D6202CC371C32CE0576098").unwrap();
        frame[13] ^= 0xFF;
        assert_ne!(modes_checksum(&frame, 112).unwrap(), 0);
    }

    #[test]
    fn too_short_input_is_rejected() {
        let frame = hex::decode("8D4840D6").unwrap();
        assert!(modes_checksum(&frame, 112).is_err());
    }
}
