pub mod filter;
pub mod ignore;
