use rand::{distributions::Alphanumeric, seq::SliceRandom, Rng};
use time::OffsetDateTime;

use super::repo_types::NewUser;
use crate::auth::password::random_string;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Alan", "Barbara", "Claude", "Donald", "Edsger", "Frances", "Grace", "Ken", "Margaret",
    "Niklaus", "Radia", "Tony", "Vint", "Whitfield",
];

const LAST_NAMES: &[&str] = &[
    "Allen", "Cerf", "Diffie", "Dijkstra", "Hamilton", "Hoare", "Hopper", "Knuth", "Liskov",
    "Lovelace", "Perlman", "Shannon", "Thompson", "Turing", "Wirth",
];

/// Random but plausible users for seeding. All share one password hash.
pub struct UserFactory {
    password_hash: String,
}

impl UserFactory {
    pub fn new(password_hash: String) -> Self {
        Self { password_hash }
    }

    pub fn make<R: Rng>(&self, rng: &mut R) -> NewUser {
        let first = FIRST_NAMES.choose(rng).copied().unwrap_or("Test");
        let last = LAST_NAMES.choose(rng).copied().unwrap_or("User");
        let tag: String = rng
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect::<String>()
            .to_lowercase();
        NewUser {
            name: format!("{first} {last}"),
            email: format!(
                "{}.{}.{tag}@example.com",
                first.to_lowercase(),
                last.to_lowercase()
            ),
            email_verified_at: Some(OffsetDateTime::now_utc()),
            password_hash: self.password_hash.clone(),
            remember_token: Some(random_string(10)),
            active: true,
            verify: true,
            agree: true,
        }
    }
}
