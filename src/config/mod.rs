pub mod settings;

pub use settings::{
    BotSettings, ChannelSettings, FeatureFlags, LinkSettings, RoleSettings, SweepSettings,
    TicketSettings,
};
