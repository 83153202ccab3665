pub mod conversation_service;
pub mod engagement_service;
pub mod media_store;
pub mod mention_parser;
pub mod message_service;
pub mod notification_service;
