pub mod increment;
