mod settings;

pub use settings::{
    ApiConfig, DispatchConfig, OccupancyConfig, PusherConfig, ServerConfig, Settings,
};
