use std::collections::BTreeMap;

use serde::Serialize;

use crate::media::services::MediaView;
use crate::users::User;

#[derive(Debug, Serialize)]
pub struct ProfilePage {
    pub user: User,
    pub roles: Vec<String>,
    pub avatar: Vec<MediaView>,
    /// Rule strings per field for client-side validation.
    pub validation: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdated {
    pub user: User,
    pub avatar: MediaView,
}
