// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod edits;
pub mod export;
pub mod forms;
pub mod ids;
pub mod import;
pub mod model;
pub mod purchases;
pub mod resource;
pub mod sales;
pub mod state;
pub mod view;

pub use edits::*;
pub use export::*;
pub use forms::*;
pub use ids::*;
pub use import::*;
pub use model::*;
pub use purchases::*;
pub use resource::*;
pub use sales::*;
pub use state::*;
pub use view::*;
