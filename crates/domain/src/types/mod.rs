//! Domain types and models

pub mod calendar_view;
pub mod event;
pub mod notification;
pub mod post;
pub mod settings;
pub mod status;
pub mod subscription;
pub mod user;

pub use calendar_view::{
    CalendarViewRequest, CalendarViewResponse, JobSummary, MailboxSettings, RemoteApiError,
};
pub use event::{
    sort_by_start, Attendee, EmailAddress, Event, EventDateTime, EventMetadata,
    EventResponseStatus, EventSnapshot, Location, OnlineMeeting,
};
pub use notification::Notification;
pub use post::{
    Attachment, AttachmentField, Post, PostAction, PostActionIntegration, PostActionOption,
    PostActionType,
};
pub use settings::{DailySummarySettings, Settings, SettingsPatch, StatusOption};
pub use status::{CustomStatus, PlatformStatus, PresenceStatus};
pub use subscription::{RemoteSubscription, Subscription};
pub use user::{
    OAuth2Token, PlatformUser, RemoteUser, User, UserIndex, UserShort, WelcomeFlowStatus,
};
