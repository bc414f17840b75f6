mod assembly;
mod bc;
