pub mod membership;
pub mod order;
pub mod order_item;
pub mod rate_limit;
pub mod study_resource;
pub mod user;
pub mod user_study_resource;
pub mod verification_code;

pub use membership::Entity as Membership;
pub use order::Entity as Order;
pub use order_item::Entity as OrderItem;
pub use rate_limit::Entity as RateLimit;
pub use study_resource::Entity as StudyResource;
pub use user::Entity as User;
pub use user_study_resource::Entity as UserStudyResource;
pub use verification_code::Entity as VerificationCode;
