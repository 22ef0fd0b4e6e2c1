pub mod account_service;
pub mod booking_workflow;
pub mod email_service;
pub mod image_service;
pub mod payment;
pub mod review_service;
pub mod upload_form;
