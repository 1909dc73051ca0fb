use crate::helpers::JsonResponse;
use actix_web::http::header::HeaderMap;
use actix_web::Error;

/// Set by the upstream auth layer once the caller's tenant is established.
pub const TENANT_HEADER: &str = "x-tenant-id";

pub fn tenant_id(headers: &HeaderMap) -> Result<String, Error> {
    let value = headers
        .get(TENANT_HEADER)
        .ok_or_else(|| {
            JsonResponse::<()>::build().unauthorized(format!("{TENANT_HEADER} header is not set"))
        })?
        .to_str()
        .map_err(|_| {
            JsonResponse::<()>::build()
                .unauthorized(format!("{TENANT_HEADER} header can't be converted to string"))
        })?
        .trim();

    if value.is_empty() {
        return Err(JsonResponse::<()>::build().unauthorized(format!("{TENANT_HEADER} header is empty")));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::HeaderValue;
    use actix_web::http::StatusCode;

    #[test]
    fn reads_trimmed_tenant() {
        let mut headers = HeaderMap::new();
        headers.insert(
            actix_web::http::header::HeaderName::from_static(TENANT_HEADER),
            HeaderValue::from_static(" tenant_1 "),
        );
        assert_eq!(tenant_id(&headers).unwrap(), "tenant_1");
    }

    #[test]
    fn missing_tenant_is_unauthorized() {
        let err = tenant_id(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.as_response_error().status_code(), StatusCode::UNAUTHORIZED);
    }
}
