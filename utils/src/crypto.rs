use hmac::{Hmac, Mac};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha512};

type HmacSha512 = Hmac<Sha512>;

/// Generic SHA512 function.
#[inline(always)]
pub fn sha512hash(data: impl AsRef<[u8]>) -> [u8; 64] {
    Sha512::digest(data).into()
}

/// Signs the SHA512 digest of `data` with RSA PKCS#1 v1.5.
///
/// The padding is deterministic, so the same key and data always give the same signature.
pub fn rsa_sign(private_key: &RsaPrivateKey, data: impl AsRef<[u8]>) -> rsa::Result<Vec<u8>> {
    let digest = sha512hash(data);
    private_key.sign(Pkcs1v15Sign::new::<Sha512>(), &digest)
}

/// Verifies an RSA PKCS#1 v1.5 signature over the SHA512 digest of `data`.
pub fn rsa_verify(public_key: &RsaPublicKey, data: impl AsRef<[u8]>, signature: &[u8]) -> bool {
    let digest = sha512hash(data);
    public_key
        .verify(Pkcs1v15Sign::new::<Sha512>(), &digest, signature)
        .is_ok()
}

/// Keyed HMAC-SHA512 of `data` with a shared `secret`.
pub fn hmac_sha512(
    secret: &[u8],
    data: impl AsRef<[u8]>,
) -> Result<[u8; 64], hmac::digest::InvalidLength> {
    let mut mac = <HmacSha512 as Mac>::new_from_slice(secret)?;
    mac.update(data.as_ref());
    Ok(mac.finalize().into_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    const MESSAGE: &[u8] = b"hello world";

    #[test]
    fn test_hash() {
        // sha512 of "hello world"
        let expected = hex!(
            "309ecc489c12d6eb4cc40f50c902f2b4d0ed77ee511a7c7a9bcd3ca86d4cd86f"
            "989dd35bc5ff499670da34255b45b0cfd830e81f605dcf7dc5542e93ae9cd76f"
        );
        assert_eq!(sha512hash(MESSAGE), expected);
    }

    #[test]
    fn test_sign_verify() {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 1024).expect("to generate key");
        let public_key = RsaPublicKey::from(&private_key);

        let signature = rsa_sign(&private_key, MESSAGE).expect("to sign");
        assert!(rsa_verify(&public_key, MESSAGE, &signature));

        // same input, same signature
        let again = rsa_sign(&private_key, MESSAGE).expect("to sign");
        assert_eq!(signature, again);

        assert!(!rsa_verify(&public_key, b"hello brothers", &signature));
    }

    #[test]
    fn test_hmac() {
        let first = hmac_sha512(b"secret", MESSAGE).expect("to hash");
        assert_eq!(first, hmac_sha512(b"secret", MESSAGE).expect("to hash"));
        assert_ne!(first, hmac_sha512(b"other-secret", MESSAGE).expect("to hash"));
        assert_ne!(first, sha512hash(MESSAGE));
    }
}
