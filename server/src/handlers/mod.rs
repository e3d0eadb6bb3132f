// HTTP handlers module structure

pub(crate) mod form;
pub(crate) mod health_handlers;
pub(crate) mod image_handlers;
pub(crate) mod menu_handlers;
