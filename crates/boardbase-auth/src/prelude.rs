pub use crate::errors::AuthError;
pub use crate::resolver::{
    CredentialResolver, RequestSnapshot, SERVICE_TOKEN_HEADER, USER_BODY_FIELD, USER_HEADER,
    USER_QUERY_PARAM,
};
