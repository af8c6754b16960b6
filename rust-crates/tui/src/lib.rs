pub mod animation;
pub mod telemetry;
pub mod wallets;
