pub mod blood;
pub mod donor;
pub mod message;
pub mod request;
pub mod response;

// 重新导出常用类型
pub use blood::{compatible_donor_groups, BloodGroup};
pub use donor::{Donor, PushSubscription, RegisterDonorPayload};
pub use message::Message;
pub use request::{
    BloodRequest, DonorDetails, RequestStatus, ResolveRequestPayload, RevealCodePayload,
    SubmitOutcome, SubmitRequestPayload, Urgency,
};
pub use response::ApiResponse;
