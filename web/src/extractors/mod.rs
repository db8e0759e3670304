pub(crate) mod authenticated_principal;

use axum::http::StatusCode;

type RejectionType = (StatusCode, String);
