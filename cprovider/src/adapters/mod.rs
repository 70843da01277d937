#[cfg(feature = "backend-openai")]
pub mod openai;

#[cfg(feature = "backend-claude-cli")]
pub mod claude_cli;
