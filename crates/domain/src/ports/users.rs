use crate::DomainResult;
use crate::identity::UserProfile;

pub trait UserDirectory: Send + Sync {
    fn get(
        &self,
        user_id: &str,
    ) -> crate::ports::BoxFuture<'_, DomainResult<Option<UserProfile>>>;

    /// Batched lookup; unknown ids are simply absent from the result.
    fn get_many(
        &self,
        user_ids: &[String],
    ) -> crate::ports::BoxFuture<'_, DomainResult<Vec<UserProfile>>>;
}
