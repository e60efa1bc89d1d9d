pub mod comment_service;
pub mod like_service;
pub mod media_service;
pub mod pagination;
pub mod playlist_service;
pub mod subscription_service;
pub mod token_service;
pub mod user_service;
pub mod video_service;
