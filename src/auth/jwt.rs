use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, Validation, decode};

/// Decode and validate an access token. Refresh tokens are rejected here,
/// they are only good for minting new access tokens.
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())?;

    if claims.token_type != TokenType::Access {
        return Err("Refresh token cannot be used for API access".to_string());
    }
    Ok(claims)
}

#[cfg(test)]
pub fn sign_token(claims: &Claims, secret: &str) -> String {
    use jsonwebtoken::{EncodingKey, Header, encode};

    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

#[cfg(test)]
pub fn test_claims(role: u8, employee_id: Option<u64>, token_type: TokenType) -> Claims {
    let exp = chrono::Utc::now().timestamp() as usize + 900;
    Claims {
        user_id: 1,
        sub: "tester".to_string(),
        role,
        exp,
        token_type,
        employee_id,
    }
}
