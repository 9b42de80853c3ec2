// Integration-style tests exercising the manager, registry and components together
mod integration;
