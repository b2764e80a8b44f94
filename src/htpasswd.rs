//! htpasswd credential hashing
//!
//! Basic-auth Secrets hold a single htpasswd line, `user:$apr1$salt$hash`,
//! which ingress controllers verify directly. The hash is Apache's APR1
//! variant of MD5-crypt.

use rand::Rng;

/// Magic prefix of APR1 hashes
const APR1_MAGIC: &str = "$apr1$";

/// Salt length used for new hashes
pub const SALT_LEN: usize = 8;

/// Alphabet of the crypt flavour of base64
const ITOA64: &[u8; 64] = b"./0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Generate a fresh salt of [`SALT_LEN`] uppercase ASCII letters.
///
/// Uses the thread-local CSPRNG, so concurrent calls do not collide.
pub fn generate_salt() -> String {
    let mut rng = rand::thread_rng();
    (0..SALT_LEN)
        .map(|_| char::from(rng.gen_range(b'A'..=b'Z')))
        .collect()
}

/// Compute the APR1-MD5 hash of `password` with `salt`.
///
/// Only the first eight characters of the salt are used, as in `htpasswd`.
pub fn apr1_hash(password: &str, salt: &str) -> String {
    let pw = password.as_bytes();
    let salt = &salt.as_bytes()[..salt.len().min(SALT_LEN)];

    let mut ctx = md5::Context::new();
    ctx.consume(pw);
    ctx.consume(APR1_MAGIC.as_bytes());
    ctx.consume(salt);

    let mut alt = md5::Context::new();
    alt.consume(pw);
    alt.consume(salt);
    alt.consume(pw);
    let alt = alt.compute();

    let mut remaining = pw.len();
    while remaining > 0 {
        let n = remaining.min(16);
        ctx.consume(&alt.0[..n]);
        remaining -= n;
    }

    let mut bits = pw.len();
    while bits > 0 {
        if bits & 1 == 1 {
            ctx.consume([0u8]);
        } else {
            ctx.consume(&pw[..1]);
        }
        bits >>= 1;
    }

    let mut digest = ctx.compute().0;

    // 1000 rounds of stretching
    for round in 0..1000 {
        let mut c = md5::Context::new();
        if round & 1 == 1 {
            c.consume(pw);
        } else {
            c.consume(digest);
        }
        if round % 3 != 0 {
            c.consume(salt);
        }
        if round % 7 != 0 {
            c.consume(pw);
        }
        if round & 1 == 1 {
            c.consume(digest);
        } else {
            c.consume(pw);
        }
        digest = c.compute().0;
    }

    let mut out = String::with_capacity(APR1_MAGIC.len() + salt.len() + 23);
    out.push_str(APR1_MAGIC);
    out.push_str(&String::from_utf8_lossy(salt));
    out.push('$');
    for (a, b, c) in [(0, 6, 12), (1, 7, 13), (2, 8, 14), (3, 9, 15), (4, 10, 5)] {
        let v = (u32::from(digest[a]) << 16) | (u32::from(digest[b]) << 8) | u32::from(digest[c]);
        push_b64(&mut out, v, 4);
    }
    push_b64(&mut out, u32::from(digest[11]), 2);
    out
}

fn push_b64(out: &mut String, mut v: u32, n: usize) {
    for _ in 0..n {
        out.push(char::from(ITOA64[(v & 0x3f) as usize]));
        v >>= 6;
    }
}

/// Build an htpasswd line for `user` with a freshly salted hash.
///
/// Every call draws a new salt, so the same credentials yield different lines.
pub fn htpasswd_line(user: &str, password: &str) -> String {
    format!("{user}:{}", apr1_hash(password, &generate_salt()))
}
