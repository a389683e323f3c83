pub mod mixture_file;
