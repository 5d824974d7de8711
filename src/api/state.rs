//! API state shared across endpoints.

use crate::auth::AdminAuth;
use crate::registration::Registrar;

pub struct ApiState {
    pub registrar: Registrar,
    pub admin: AdminAuth,
}

impl ApiState {
    pub fn new(registrar: Registrar, admin: AdminAuth) -> Self {
        Self { registrar, admin }
    }
}
