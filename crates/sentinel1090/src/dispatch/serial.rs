//! LoRa gateway transport over a local serial port, built on `tokio-serial`
//! for fully-async I/O.
use crate::error::DeliveryError;
use aes::Aes128;
use aes::Aes256;
use base64::Engine;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;
use tokio::io::AsyncWriteExt;
use tokio_serial::SerialPortBuilderExt;

type Ctr128 = ctr::Ctr128BE<Aes128>;
type Ctr256 = ctr::Ctr128BE<Aes256>;

pub struct SerialInterface {
    device: String,
    baud: u32,
    channel_number: u8,
    psk: Option<Vec<u8>>,
}

impl SerialInterface {
    pub fn new(device: String, baud: u32, channel_number: u8, psk_b64: Option<&str>) -> Result<Self, DeliveryError> {
        let psk = psk_b64
            .map(|s| {
                base64::engine::general_purpose::STANDARD
                    .decode(s)
                    .map_err(|e| DeliveryError::Permanent(format!("invalid PSK base64: {e}")))
            })
            .transpose()?;
        if let Some(key) = &psk {
            if key.len() != 16 && key.len() != 32 {
                return Err(DeliveryError::Permanent(
                    "PSK must decode to 16 or 32 bytes (AES-128/256)".to_string(),
                ));
            }
        }
        Ok(SerialInterface {
            device,
            baud,
            channel_number,
            psk,
        })
    }

    fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        let Some(key) = &self.psk else {
            return plaintext.to_vec();
        };
        let mut nonce = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut nonce);
        // Counter blocks are 16 bytes: the 12-byte nonce followed by a
        // 4-byte big-endian counter, which starts at zero.
        let mut counter_block = [0u8; 16];
        counter_block[..12].copy_from_slice(&nonce);
        let mut buf = plaintext.to_vec();
        if key.len() == 16 {
            let mut cipher = Ctr128::new_from_slices(key, &counter_block)
                .expect("key and iv lengths checked at construction");
            cipher.apply_keystream(&mut buf);
        } else {
            let mut cipher = Ctr256::new_from_slices(key, &counter_block)
                .expect("key and iv lengths checked at construction");
            cipher.apply_keystream(&mut buf);
        }
        let mut out = Vec::with_capacity(nonce.len() + buf.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&buf);
        out
    }

    pub async fn send(&self, payload: &str, max_message_length: usize) -> Result<(), DeliveryError> {
        if payload.len() > max_message_length.min(237) {
            return Err(DeliveryError::Permanent(format!(
                "message of {} bytes exceeds max_message_length {}",
                payload.len(),
                max_message_length
            )));
        }
        let framed = self.encrypt(payload.as_bytes());
        let mut port = tokio_serial::new(&self.device, self.baud)
            .open_native_async()
            .map_err(|e| DeliveryError::Transient(format!("opening {}: {e}", self.device)))?;

        let mut packet = Vec::with_capacity(framed.len() + 2);
        packet.push(self.channel_number);
        packet.push(framed.len() as u8);
        packet.extend_from_slice(&framed);

        port.write_all(&packet)
            .await
            .map_err(|e| DeliveryError::Transient(format!("writing to {}: {e}", self.device)))?;
        port.flush()
            .await
            .map_err(|e| DeliveryError::Transient(format!("flushing {}: {e}", self.device)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_psk_length() {
        let bad = base64::engine::general_purpose::STANDARD.encode([0u8; 10]);
        let iface = SerialInterface::new("/dev/null".to_string(), 115_200, 0, Some(&bad));
        assert!(iface.is_err());
    }

    #[test]
    fn accepts_aes128_psk() {
        let key = base64::engine::general_purpose::STANDARD.encode([0u8; 16]);
        let iface = SerialInterface::new("/dev/null".to_string(), 115_200, 0, Some(&key));
        assert!(iface.is_ok());
    }

    fn decrypt(key: &[u8], framed: &[u8]) -> Vec<u8> {
        let (nonce, ciphertext) = framed.split_at(12);
        let mut counter_block = [0u8; 16];
        counter_block[..12].copy_from_slice(nonce);
        let mut buf = ciphertext.to_vec();
        if key.len() == 16 {
            let mut cipher = Ctr128::new_from_slices(key, &counter_block).unwrap();
            cipher.apply_keystream(&mut buf);
        } else {
            let mut cipher = Ctr256::new_from_slices(key, &counter_block).unwrap();
            cipher.apply_keystream(&mut buf);
        }
        buf
    }

    #[test]
    fn aes128_round_trips() {
        let key_bytes = [7u8; 16];
        let key = base64::engine::general_purpose::STANDARD.encode(key_bytes);
        let iface = SerialInterface::new("/dev/null".to_string(), 115_200, 0, Some(&key)).unwrap();
        let framed = iface.encrypt(b"hello lora");
        assert_eq!(framed.len(), 12 + b"hello lora".len());
        assert_eq!(decrypt(&key_bytes, &framed), b"hello lora");
    }

    #[test]
    fn aes256_round_trips() {
        let key_bytes = [9u8; 32];
        let key = base64::engine::general_purpose::STANDARD.encode(key_bytes);
        let iface = SerialInterface::new("/dev/null".to_string(), 115_200, 0, Some(&key)).unwrap();
        let framed = iface.encrypt(b"hello lora");
        assert_eq!(decrypt(&key_bytes, &framed), b"hello lora");
    }
}
